//! Upstream source provider: releases, repository search, and file fetches.
//!
//! The pipeline talks to the release host only through [`SourceProvider`],
//! so discovery and extraction can be exercised without network access. The
//! production implementation is [`github::GitHubClient`].

pub mod github;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// The asset filename.
    pub name: String,
    /// Direct download locator.
    pub browser_download_url: String,
}

/// The latest release of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Release tag, usually `v<version>`.
    pub tag_name: String,
    /// Publication timestamp as reported by the host.
    #[serde(default)]
    pub published_at: Option<String>,
    /// Files attached to the release.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// The version string: the tag without a leading `v`.
    #[must_use]
    pub fn version(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }
}

/// Owner of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryOwner {
    /// Account login.
    pub login: String,
}

/// A repository returned by topic search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// `owner/name`.
    pub full_name: String,
    /// Owning account.
    pub owner: RepositoryOwner,
    /// Web page of the repository.
    pub html_url: String,
}

/// Errors arising from upstream requests.
///
/// None of these are fatal for a run; a failed fetch degrades the template
/// or repository it concerns.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request failed or returned a non-success status.
    #[error("request failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The resource does not exist (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The response body could not be decoded.
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// The URL that was requested.
        url: String,
        /// Description of the decode failure.
        reason: String,
    },

    /// A download exceeded its size bound and was discarded.
    #[error("download from {url} exceeds {limit} bytes")]
    TooLarge {
        /// The URL that was requested.
        url: String,
        /// The byte limit that was exceeded.
        limit: u64,
    },

    /// Writing the downloaded file failed.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Access to the release host.
#[cfg_attr(test, mockall::automock)]
pub trait SourceProvider {
    /// Fetch the latest release of `repo` (`owner/name`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the request fails or the repository has
    /// no release.
    fn latest_release(&self, repo: &str) -> Result<Release, FetchError>;

    /// List repositories tagged with `topic`, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the search request fails.
    fn search_repositories(&self, topic: &str) -> Result<Vec<Repository>, FetchError>;

    /// Fetch the raw contents of `path` in `repo` at the default branch.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the file does not exist.
    fn file_contents(&self, repo: &str, path: &str) -> Result<String, FetchError>;

    /// Fetch the repository's root README.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the repository has no README.
    fn readme(&self, repo: &str) -> Result<String, FetchError>;

    /// Download `url` into `dest`, refusing bodies larger than `max_bytes`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::TooLarge`] (after deleting `dest`) when the body
    /// exceeds the bound, or another [`FetchError`] when the request fails.
    fn download(&self, url: &str, dest: &Path, max_bytes: u64) -> Result<u64, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("v1.2.0", "1.2.0")]
    #[case("1.2.0", "1.2.0")]
    #[case("vv2", "v2")]
    fn version_strips_single_leading_v(#[case] tag: &str, #[case] version: &str) {
        let release = Release {
            tag_name: tag.to_owned(),
            published_at: None,
            assets: Vec::new(),
        };
        assert_eq!(release.version(), version);
    }

    #[test]
    fn release_tolerates_missing_optional_fields() {
        let release: Release =
            serde_json::from_str(r#"{"tag_name":"v1.0.0"}"#).expect("minimal release parses");
        assert!(release.assets.is_empty());
        assert!(release.published_at.is_none());
    }
}
