//! GitHub REST implementation of [`SourceProvider`] using `ureq`.

use super::{FetchError, Release, Repository, SourceProvider};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Default REST API root.
pub const GITHUB_API: &str = "https://api.github.com";

/// Network timeout for API requests.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Network timeout for binary downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Search results returned per page.
const SEARCH_PAGE_SIZE: &str = "100";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";

/// GitHub client with an optional bearer token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api_base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

impl GitHubClient {
    /// Create a client for `api_base` authenticating with `token` when given.
    #[must_use]
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Create a client for the public API, reading `GITHUB_TOKEN` if set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GITHUB_API, std::env::var("GITHUB_TOKEN").ok())
    }

    /// Build an API URL from a path beginning with `/`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn get(
        &self,
        agent: &ureq::Agent,
        url: &str,
        accept: &str,
    ) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        let request = agent
            .get(url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", API_VERSION);
        let Some(token) = &self.token else {
            return request;
        };
        request.header("Authorization", format!("Bearer {token}"))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get_text(url, ACCEPT_JSON)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }

    fn get_text(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        log::debug!("GET {url}");
        let response = self
            .get(api_agent(), url, accept)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }
}

impl SourceProvider for GitHubClient {
    fn latest_release(&self, repo: &str) -> Result<Release, FetchError> {
        self.get_json(&self.api_url(&format!("/repos/{repo}/releases/latest")))
    }

    fn search_repositories(&self, topic: &str) -> Result<Vec<Repository>, FetchError> {
        let url = self.api_url("/search/repositories");
        log::debug!("GET {url} (topic:{topic})");
        let response = self
            .get(api_agent(), &url, ACCEPT_JSON)
            .query("q", format!("topic:{topic}"))
            .query("sort", "updated")
            .query("per_page", SEARCH_PAGE_SIZE)
            .call()
            .map_err(|e| map_ureq_error(&url, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::HttpError {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let parsed: SearchResponse = serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url,
            reason: e.to_string(),
        })?;
        Ok(parsed.items)
    }

    fn file_contents(&self, repo: &str, path: &str) -> Result<String, FetchError> {
        let relative = path.trim_start_matches('/');
        self.get_text(&self.api_url(&format!("/repos/{repo}/contents/{relative}")), ACCEPT_RAW)
    }

    fn readme(&self, repo: &str) -> Result<String, FetchError> {
        self.get_text(&self.api_url(&format!("/repos/{repo}/readme")), ACCEPT_RAW)
    }

    fn download(&self, url: &str, dest: &Path, max_bytes: u64) -> Result<u64, FetchError> {
        log::debug!("downloading {url}");
        let response = self
            .get(download_agent(), url, "application/octet-stream")
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let reader = response.into_body().into_reader();
        write_bounded(reader, dest, max_bytes).map_err(|err| match err {
            BoundedWriteError::TooLarge => FetchError::TooLarge {
                url: url.to_owned(),
                limit: max_bytes,
            },
            BoundedWriteError::Io(e) => FetchError::Io(e),
        })
    }
}

enum BoundedWriteError {
    TooLarge,
    Io(io::Error),
}

/// Copy at most `max_bytes` from `reader` into `dest`.
///
/// On overflow the partial file is removed so nothing oversized persists.
fn write_bounded(reader: impl Read, dest: &Path, max_bytes: u64) -> Result<u64, BoundedWriteError> {
    let mut limited = reader.take(max_bytes.saturating_add(1));
    let mut file = fs::File::create(dest).map_err(BoundedWriteError::Io)?;
    let written = io::copy(&mut limited, &mut file).map_err(BoundedWriteError::Io)?;
    drop(file);
    if written > max_bytes {
        if let Err(e) = fs::remove_file(dest) {
            log::warn!("failed to remove oversized download {}: {e}", dest.display());
        }
        return Err(BoundedWriteError::TooLarge);
    }
    Ok(written)
}

/// Shared agent for API calls.
fn api_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| agent_with_timeout(API_TIMEOUT))
}

/// Shared agent for binary downloads.
fn download_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| agent_with_timeout(DOWNLOAD_TIMEOUT))
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
