use chrono::{DateTime, Utc};

/// All timestamps in the workspace are UTC; this alias exists purely so
/// every crate imports the same concrete type instead of re-deriving it.
pub type Timestamp = DateTime<Utc>;

/// The current time, as a `Timestamp`. The sole indirection point so that
/// tests can eventually inject a clock without touching call sites.
pub fn now() -> Timestamp {
    Utc::now()
}
