//! Error types for digest handling.

use thiserror::Error;

/// Errors arising from digest parsing and computation.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// A digest is not a 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidDigest {
        /// Description of the validation failure.
        reason: String,
    },

    /// A checksum manifest line could not be parsed.
    #[error("malformed checksum line {line}: {reason}")]
    MalformedLine {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        reason: String,
    },

    /// The same filename appears twice with different digests.
    #[error("conflicting digests for {filename} on line {line}")]
    ConflictingEntry {
        /// The duplicated filename.
        filename: String,
        /// One-based line number of the second entry.
        line: usize,
    },

    /// Reading the file being hashed failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being hashed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`ChecksumError`].
pub type Result<T> = std::result::Result<T, ChecksumError>;
