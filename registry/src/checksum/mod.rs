//! SHA-256 digests and checksum manifests.
//!
//! Every trust boundary in the pipeline goes through this module: binaries
//! downloaded from third-party releases are checked against the release's
//! `SHA256SUMS`, and verified builds publish a `SHA256SUMS` in the same
//! format so consumers can repeat the check.
//!
//! # Sub-modules
//!
//! - [`compute`] - Streaming digest computation.
//! - [`error`] - Parse and I/O errors.
//! - [`manifest`] - `SHA256SUMS` parsing and rendering (`HashManifest`).
//! - [`sha256_digest`] - Validated digest newtype (`Sha256Digest`).
//! - [`verify`] - Three-valued verification (`Verification`).

pub mod compute;
pub mod error;
pub mod manifest;
pub mod sha256_digest;
pub mod verify;

pub use compute::{compute_sha256, sha256_bytes};
pub use error::ChecksumError;
pub use manifest::HashManifest;
pub use sha256_digest::Sha256Digest;
pub use verify::{Verification, verify_against, verify_file};
