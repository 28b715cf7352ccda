//! Streaming SHA-256 computation.

use super::error::{ChecksumError, Result};
use super::sha256_digest::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read buffer size; files are never loaded whole.
const CHUNK_SIZE: usize = 8192;

/// Compute the SHA-256 digest of a file.
///
/// Reads the file at `path` in fixed-size chunks, so memory use does not
/// grow with the artifact size.
///
/// # Errors
///
/// Returns [`ChecksumError::Read`] if the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> Result<Sha256Digest> {
    let read_error = |source| ChecksumError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = fs::File::open(path).map_err(read_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(to_digest(format!("{:x}", hasher.finalize())))
}

/// Compute the SHA-256 digest of an in-memory buffer.
#[must_use]
pub fn sha256_bytes(bytes: &[u8]) -> Sha256Digest {
    to_digest(format!("{:x}", Sha256::digest(bytes)))
}

fn to_digest(hex: String) -> Sha256Digest {
    // `LowerHex` on a finalised SHA-256 output is always 64 lowercase digits.
    Sha256Digest::from_lower_hex(hex)
}
