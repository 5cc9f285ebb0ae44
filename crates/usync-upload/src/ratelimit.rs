use std::time::{Duration, Instant};

use tokio::sync::Mutex;

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

struct State {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket governing upload byte throughput (`UPLOAD_BPS`).
/// Tokens are consumed before each POST; `rate_bps == 0` disables limiting
/// entirely, the default.
pub struct TokenBucket {
    state: Mutex<State>,
    rate_bps: f64,
    capacity: f64,
}

//--------------------------------------------------------------------------------------------------
// Implementation
//--------------------------------------------------------------------------------------------------

impl TokenBucket {
    /// `rate_bps` bytes/sec sustained, with a one-second burst capacity.
    pub fn new(rate_bps: u64) -> Self {
        let capacity = (rate_bps as f64).max(1.0);
        Self { state: Mutex::new(State { tokens: capacity, last_refill: Instant::now() }), rate_bps: rate_bps as f64, capacity }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Blocks until `bytes` tokens are available, refilling proportionally
    /// to elapsed wall-clock time since the last call.
    pub async fn consume(&self, bytes: u64) {
        if self.rate_bps <= 0.0 {
            return;
        }
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_bps).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= bytes as f64 {
                    state.tokens -= bytes as f64;
                    None
                } else {
                    let deficit = bytes as f64 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate_bps))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_bucket_never_waits() {
        let bucket = TokenBucket::unlimited();
        let start = Instant::now();
        bucket.consume(10_000_000).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn exhausting_capacity_forces_a_wait() {
        let bucket = TokenBucket::new(1000);
        bucket.consume(1000).await; // drains the initial burst
        let start = Instant::now();
        bucket.consume(500).await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
