//! `SHA256SUMS` checksum lists.
//!
//! Lines follow the `sha256sum` output format: `<hex digest>  [*]<filename>`.
//! The optional `*` is the binary-mode marker and is not part of the filename.
//! Rendering always emits text mode (`<digest>  <filename>`) sorted by
//! filename, which is also what the verified build publishes.

use super::error::{ChecksumError, Result};
use super::sha256_digest::Sha256Digest;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Mapping from exact asset filename to its expected digest.
///
/// # Examples
///
/// ```
/// use presto_registry::checksum::HashManifest;
///
/// let text = format!("{}  *presto-template-gongwen-linux-amd64\n", "a".repeat(64));
/// let manifest = HashManifest::parse(&text).expect("valid manifest");
/// assert!(manifest.get("presto-template-gongwen-linux-amd64").is_some());
/// assert!(manifest.get("*presto-template-gongwen-linux-amd64").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashManifest {
    entries: BTreeMap<String, Sha256Digest>,
}

impl HashManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse checksum list text.
    ///
    /// Blank lines and `#` comments are skipped. Uppercase digests are
    /// normalised to lowercase. Repeating a filename with the same digest is
    /// tolerated; repeating it with a different digest is an error, since
    /// either choice would be a guess.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::MalformedLine`] for lines that do not follow
    /// the format and [`ChecksumError::ConflictingEntry`] for contradictory
    /// duplicates.
    pub fn parse(text: &str) -> Result<Self> {
        let mut manifest = Self::new();
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let (digest, filename) = parse_line(line, line_no)?;
            match manifest.entries.entry(filename) {
                Entry::Vacant(slot) => {
                    slot.insert(digest);
                }
                Entry::Occupied(existing) if *existing.get() == digest => {}
                Entry::Occupied(existing) => {
                    return Err(ChecksumError::ConflictingEntry {
                        filename: existing.key().clone(),
                        line: line_no,
                    });
                }
            }
        }
        Ok(manifest)
    }

    /// Record the digest of `filename`, replacing any previous value.
    pub fn insert(&mut self, filename: impl Into<String>, digest: Sha256Digest) {
        self.entries.insert(filename.into(), digest);
    }

    /// Look up the expected digest of `filename`.
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&Sha256Digest> {
        self.entries.get(filename)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sha256Digest)> {
        self.entries.iter().map(|(name, digest)| (name.as_str(), digest))
    }

    /// Render the manifest in `sha256sum` text format, sorted by filename.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(name, digest)| format!("{digest}  {name}\n"))
            .collect()
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<(Sha256Digest, String)> {
    let malformed = |reason: &str| ChecksumError::MalformedLine {
        line: line_no,
        reason: reason.to_owned(),
    };

    let (hex, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| malformed("expected `<digest>  <filename>`"))?;
    let digest = Sha256Digest::parse_lenient(hex).map_err(|e| malformed(&e.to_string()))?;

    // Accept one or two separator characters; coreutils emits a space
    // followed by either a space (text) or `*` (binary).
    let marked = rest.strip_prefix(' ').unwrap_or(rest);
    let filename = marked.strip_prefix('*').unwrap_or(marked);
    if filename.is_empty() {
        return Err(malformed("missing filename"));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(malformed("filename must not contain a path"));
    }
    Ok((digest, filename.to_owned()))
}
