//! Pure chunk-planning logic, kept free of I/O and crypto so it can
//! be exercised with `proptest` over arbitrary sizes.

/// Default `PAYLOAD_MAX`: the maximum plaintext bytes per segment.
pub const PAYLOAD_MAX: u64 = 768_000;

/// A file qualifies for packing when its size is at most a quarter of
/// `PAYLOAD_MAX`.
pub fn packing_threshold(payload_max: u64) -> u64 {
    payload_max / 4
}

/// One `(offset, length)` slice of a file destined for a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub segment_index: u32,
    pub offset: u64,
    pub length: u64,
}

/// Splits a file of `size` bytes into consecutive `payload_max`-sized
/// chunks, the last one holding the remainder. A zero-byte file still
/// yields exactly one (empty) chunk, since every file owns at least one
/// segment in the data model.
pub fn plan_chunks(size: u64, payload_max: u64) -> Vec<ChunkPlan> {
    assert!(payload_max > 0, "payload_max must be positive");

    if size == 0 {
        return vec![ChunkPlan { segment_index: 0, offset: 0, length: 0 }];
    }

    let mut plans = Vec::new();
    let mut offset = 0u64;
    let mut index = 0u32;
    while offset < size {
        let length = payload_max.min(size - offset);
        plans.push(ChunkPlan { segment_index: index, offset, length });
        offset += length;
        index += 1;
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_chunk_when_under_payload_max() {
        let plans = plan_chunks(100, PAYLOAD_MAX);
        assert_eq!(plans, vec![ChunkPlan { segment_index: 0, offset: 0, length: 100 }]);
    }

    #[test]
    fn splits_into_consecutive_chunks_with_remainder_last() {
        let plans = plan_chunks(PAYLOAD_MAX + 1, PAYLOAD_MAX);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].length, PAYLOAD_MAX);
        assert_eq!(plans[1].length, 1);
        assert_eq!(plans[1].offset, PAYLOAD_MAX);
    }

    #[test]
    fn empty_file_still_yields_one_segment() {
        let plans = plan_chunks(0, PAYLOAD_MAX);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].length, 0);
    }

    proptest! {
        #[test]
        fn chunks_always_reconstruct_the_full_size(size in 0u64..5_000_000, payload_max in 1u64..2_000_000) {
            let plans = plan_chunks(size, payload_max);
            let total: u64 = plans.iter().map(|p| p.length).sum();
            prop_assert_eq!(total, size);
            for (i, plan) in plans.iter().enumerate() {
                prop_assert_eq!(plan.segment_index as usize, i);
            }
        }
    }
}
