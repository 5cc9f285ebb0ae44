//! Shared types for the usync workspace.
//!
//! Every crate in the workspace that needs a folder/file/share identifier,
//! a `Result` alias, or the error taxonomy reaches for this crate instead
//! of rolling its own. In particular, [`FolderUniqueId`] and [`DbFolderId`]
//! are distinct, non-convertible types on purpose: the source system this
//! was modeled on had a defect where a local numeric row id was sometimes
//! handed to cryptographic code expecting the folder's cross-host
//! identifier. Making the two types refuse to convert into each other
//! closes that defect at compile time.

mod config;
mod error;
mod ids;
mod time;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use time::*;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, UsyncError>;
