//! Pooled, TLS-authenticated NNTP client: connection handshake,
//! POST/ARTICLE/STAT/XOVER, yEnc encode/decode, and the retry and
//! connection-pool policies.

mod backoff;
mod connection;
mod error;
mod pool;
mod tls;
pub mod yenc;

pub use backoff::Backoff;
pub use connection::{Article, NntpConnection};
pub use error::{NntpError, Result};
pub use pool::{ConnectionPool, NntpConfig, PooledConnection};
pub use tls::{connect, AsyncReadWrite};
