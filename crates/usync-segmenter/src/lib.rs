//! Fixed-size segmentation, small-file packing and redundancy copies.

mod chunker;
mod error;
mod pack;
mod segment;
mod staging;

pub use chunker::{packing_threshold, plan_chunks, ChunkPlan, PAYLOAD_MAX};
pub use error::{Result, SegmenterError};
pub use pack::{decode_pack_header, encode_pack_header, pack_small_files, PackCandidate, PackEntry, PackedGroup};
pub use segment::{segment_folder, SegmentPolicy, SegmentResult};
pub use staging::segment_blob_path;
