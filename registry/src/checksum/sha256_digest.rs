//! SHA-256 digest newtype.
//!
//! Digests cross every trust boundary in the pipeline, so only canonical
//! lowercase hex is representable. Checksum lists written by other tools
//! go through [`Sha256Digest::parse_lenient`].

use super::error::{ChecksumError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hex characters in a SHA-256 digest.
const HEX_LEN: usize = 64;

/// A canonical hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use presto_registry::checksum::Sha256Digest;
///
/// let digest: Sha256Digest = "0f".repeat(32).parse().expect("canonical digest");
/// assert!(digest.as_str().starts_with("0f0f"));
/// assert!("0F".repeat(32).parse::<Sha256Digest>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// The digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap hex produced by the hasher itself.
    pub(super) const fn from_lower_hex(hex: String) -> Self {
        Self(hex)
    }

    /// Parse a digest that may use uppercase hex, as some checksum tools emit.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::InvalidDigest`] when the value is not 64 hex
    /// characters.
    pub fn parse_lenient(value: &str) -> Result<Self> {
        Self::try_from(value.to_ascii_lowercase())
    }
}

impl FromStr for Sha256Digest {
    type Err = ChecksumError;

    fn from_str(value: &str) -> Result<Self> {
        Self::try_from(value.to_owned())
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ChecksumError;

    fn try_from(value: String) -> Result<Self> {
        canonical_problem(&value).map_or_else(
            || Ok(Self(value)),
            |reason| Err(ChecksumError::InvalidDigest { reason }),
        )
    }
}

impl From<Sha256Digest> for String {
    fn from(digest: Sha256Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why `value` is not a canonical digest, if it is not one.
fn canonical_problem(value: &str) -> Option<String> {
    if value.len() != HEX_LEN {
        return Some(format!("expected {HEX_LEN} hex characters, got {}", value.len()));
    }
    value
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
        .map(|c| {
            if c.is_ascii_hexdigit() {
                format!("uppercase hex digit '{c}'")
            } else {
                format!("non-hex character '{c}'")
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(String::new(), "got 0")]
    #[case::truncated("abc123".to_owned(), "got 6")]
    #[case::non_hex(format!("{}z", "0".repeat(63)), "non-hex character 'z'")]
    #[case::uppercase("C".repeat(64), "uppercase hex digit 'C'")]
    fn rejects_non_canonical_digests(#[case] value: String, #[case] reason: &str) {
        let err = Sha256Digest::try_from(value).expect_err("not canonical");
        assert!(err.to_string().contains(reason), "{err}");
    }

    #[test]
    fn lenient_parse_lowercases_tool_output() {
        let digest = Sha256Digest::parse_lenient(&"AB".repeat(32)).expect("lenient parse");
        assert_eq!(digest.as_str(), "ab".repeat(32));
    }

    #[test]
    fn deserialising_rejects_malformed_digests() {
        let canonical = format!("\"{}\"", "7".repeat(64));
        let digest: Sha256Digest = serde_json::from_str(&canonical).expect("canonical");
        assert_eq!(serde_json::to_string(&digest).expect("serialise"), canonical);
        assert!(serde_json::from_str::<Sha256Digest>("\"7777\"").is_err());
    }
}
