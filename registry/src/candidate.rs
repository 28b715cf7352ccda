//! Template candidates produced by discovery.
//!
//! The candidate list is written to `discovered.json` in the output
//! directory so the extract and build stages can run as separate
//! invocations. It is read back as an immutable list.

use crate::source::Asset;
use crate::template_name::TemplateName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filename of the persisted candidate list.
pub const DISCOVERED_FILE: &str = "discovered.json";

/// Where a candidate came from, and how it will be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Provenance {
    /// Released by the official repository; binaries are extracted.
    Official,
    /// Released by a third-party repository; binaries are extracted.
    Community,
    /// Built from a pinned source revision in the verified pipeline.
    Verified {
        /// Commit or tag to build.
        rev: String,
        /// Package path within the repository, e.g. `./cmd/demo`.
        package: String,
        /// Source language; only `go` is buildable.
        language: String,
    },
}

impl Provenance {
    /// Whether this candidate goes through the verified build pipeline.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Community => "community",
            Self::Verified { .. } => "verified",
        }
    }
}

/// A template selected for processing in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCandidate {
    /// Validated template name.
    pub name: TemplateName,
    /// Source repository, `owner/name`.
    pub repo: String,
    /// Owning account.
    pub owner: String,
    /// Version, the release tag without a leading `v`.
    pub version: String,
    /// Release tag (or source revision for verified candidates).
    pub tag: String,
    /// Release publication time, if known.
    #[serde(default)]
    pub published_at: Option<String>,
    /// Release assets relevant to this template.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Repository web page.
    pub html_url: String,
    /// Where the candidate came from.
    pub provenance: Provenance,
    /// Repository-relative README path to try before the root README.
    #[serde(default)]
    pub readme_path: Option<String>,
}

/// Errors reading or writing the candidate list.
#[derive(Debug, Error)]
pub enum CandidateListError {
    /// The list has not been produced; run discovery first.
    #[error("{} not found; run `discover` first", path.display())]
    Missing {
        /// Expected location of the list.
        path: PathBuf,
    },

    /// The list could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Location of the list.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The list is not valid JSON for this schema.
    #[error("invalid candidate list {}: {source}", path.display())]
    Invalid {
        /// Location of the list.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Path of the candidate list inside `output_dir`.
#[must_use]
pub fn discovered_path(output_dir: &Path) -> PathBuf {
    output_dir.join(DISCOVERED_FILE)
}

/// Persist `candidates` to `output_dir`.
///
/// # Errors
///
/// Returns [`CandidateListError::Io`] if the directory or file cannot be
/// written.
pub fn save_candidates(
    output_dir: &Path,
    candidates: &[TemplateCandidate],
) -> Result<PathBuf, CandidateListError> {
    let path = discovered_path(output_dir);
    let io_error = |source| CandidateListError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(output_dir).map_err(io_error)?;
    let json = serde_json::to_string_pretty(candidates).map_err(|e| CandidateListError::Invalid {
        path: path.clone(),
        source: e,
    })?;
    fs::write(&path, json).map_err(io_error)?;
    Ok(path)
}

/// Load the candidate list from `output_dir`.
///
/// # Errors
///
/// Returns [`CandidateListError::Missing`] when discovery has not run, or
/// another variant when the file is unreadable or malformed.
pub fn load_candidates(output_dir: &Path) -> Result<Vec<TemplateCandidate>, CandidateListError> {
    let path = discovered_path(output_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CandidateListError::Missing { path });
        }
        Err(source) => return Err(CandidateListError::Io { path, source }),
    };
    serde_json::from_str(&text).map_err(|source| CandidateListError::Invalid { path, source })
}
