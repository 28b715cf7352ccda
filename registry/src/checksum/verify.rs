//! Digest verification at trust boundaries.
//!
//! Verification is deliberately three-valued: "no expected digest" is a
//! different answer from "expected digest matched", and callers must never
//! collapse [`Verification::Unknown`] into success.

use super::compute::compute_sha256;
use super::error::Result;
use super::manifest::HashManifest;
use super::sha256_digest::Sha256Digest;
use std::fmt;
use std::path::Path;

/// Outcome of comparing a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The file's digest equals the expected digest.
    Match(Sha256Digest),
    /// The file's digest differs from the expected digest.
    Mismatch {
        /// Digest the publisher claimed.
        expected: Sha256Digest,
        /// Digest of the bytes on disk.
        actual: Sha256Digest,
    },
    /// No expected digest was available; the file is unverifiable.
    Unknown(Sha256Digest),
}

impl Verification {
    /// Whether the file is positively verified.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    /// The digest computed from the file, whatever the outcome.
    #[must_use]
    pub const fn actual(&self) -> &Sha256Digest {
        match self {
            Self::Match(actual) | Self::Unknown(actual) | Self::Mismatch { actual, .. } => actual,
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match(_) => write!(f, "digest verified"),
            Self::Mismatch { expected, actual } => {
                write!(f, "digest mismatch: expected {expected}, got {actual}")
            }
            Self::Unknown(_) => write!(f, "no expected digest available"),
        }
    }
}

/// Compare the digest of `path` against `expected`.
///
/// # Errors
///
/// Returns an error only when the file cannot be read.
pub fn verify_file(path: &Path, expected: Option<&Sha256Digest>) -> Result<Verification> {
    let actual = compute_sha256(path)?;
    Ok(classify(actual, expected))
}

/// Compare the digest of `path` against the entry for `filename` in `manifest`.
///
/// A missing manifest or a missing entry both yield [`Verification::Unknown`].
///
/// # Errors
///
/// Returns an error only when the file cannot be read.
pub fn verify_against(
    path: &Path,
    manifest: Option<&HashManifest>,
    filename: &str,
) -> Result<Verification> {
    verify_file(path, manifest.and_then(|m| m.get(filename)))
}

/// Parse a possibly empty expected digest string.
///
/// Empty or malformed values produce `None`, which verification reports as
/// [`Verification::Unknown`].
#[must_use]
pub fn expected_digest(value: &str) -> Option<Sha256Digest> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Sha256Digest::parse_lenient(trimmed).ok()
}

fn classify(actual: Sha256Digest, expected: Option<&Sha256Digest>) -> Verification {
    match expected {
        None => Verification::Unknown(actual),
        Some(published) if *published == actual => Verification::Match(actual),
        Some(published) => Verification::Mismatch {
            expected: published.clone(),
            actual,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::compute::sha256_bytes;
    use std::io::Write;

    fn file_with(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write");
        file
    }

    #[test]
    fn identical_bytes_match() {
        let file = file_with(b"template binary");
        let expected = sha256_bytes(b"template binary");
        let outcome = verify_file(file.path(), Some(&expected)).expect("readable");
        assert!(outcome.is_match());
    }

    #[test]
    fn single_bit_flip_mismatches() {
        let original = b"template binary".to_vec();
        let mut flipped = original.clone();
        if let Some(byte) = flipped.first_mut() {
            *byte ^= 0x01;
        }
        let file = file_with(&flipped);
        let expected = sha256_bytes(&original);
        let outcome = verify_file(file.path(), Some(&expected)).expect("readable");
        assert!(matches!(outcome, Verification::Mismatch { .. }), "{outcome}");
    }

    #[test]
    fn empty_expected_digest_is_unknown_not_match() {
        let file = file_with(b"");
        let expected = expected_digest("");
        assert!(expected.is_none());
        let outcome = verify_file(file.path(), expected.as_ref()).expect("readable");
        assert!(matches!(outcome, Verification::Unknown(_)));
        assert!(!outcome.is_match());
    }

    #[test]
    fn manifest_miss_is_unknown() {
        let file = file_with(b"bytes");
        let mut manifest = HashManifest::new();
        manifest.insert("other", sha256_bytes(b"bytes"));
        let outcome = verify_against(file.path(), Some(&manifest), "mine").expect("readable");
        assert!(matches!(outcome, Verification::Unknown(_)));
        let without_list = verify_against(file.path(), None, "mine").expect("readable");
        assert!(matches!(without_list, Verification::Unknown(_)));
    }

    #[test]
    fn actual_digest_is_reported_for_every_outcome() {
        let file = file_with(b"bytes");
        let actual = sha256_bytes(b"bytes");
        let wrong = sha256_bytes(b"other");
        for expected in [None, Some(&actual), Some(&wrong)] {
            let outcome = verify_file(file.path(), expected).expect("readable");
            assert_eq!(outcome.actual(), &actual);
        }
    }
}
