//! Manifest assembly and the encrypted share index.
//!
//! A share index is self-contained: once decrypted, a holder can reassemble
//! every file without any further query against the publisher's store,
//! mirroring how a [`wnfs`] private forest bundles everything a reader
//! needs once they hold the right key.

mod envelope;
mod error;
mod manifest;
mod model;
mod publish;
mod unlock;

pub use envelope::{decode_envelope, encode_envelope, Envelope};
pub use error::{Result, ShareError};
pub use manifest::build_manifest;
pub use model::{Manifest, ManifestFile, ManifestSegment, SignedManifest};
pub use publish::{publish_share, PrivateMember, PublishRequest};
pub use unlock::{unlock_manifest, UnlockRequest};
