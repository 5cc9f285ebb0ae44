//! Worker pool draining a folder's segment queue into `usync-nntp`:
//! token-bucket rate limiting, exponential-backoff retries, and resumable
//! per-segment watermarks (a segment with a `message_id` is never
//! re-posted).

mod error;
mod ratelimit;
mod worker;

pub use error::{Result, UploadError};
pub use ratelimit::TokenBucket;
pub use worker::{upload_folder, UploadPolicy, UploadResult, UploadedSegment};
