//! Publishing verified builds as releases of the downstream repository.

use crate::command::{CommandError, CommandExecutor, CommandLine, stderr_text};
use crate::template_name::TemplateName;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Timeout for release commands; uploads can be slow.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(600);

/// Release tag for a verified build, `<name>-v<version>`.
#[must_use]
pub fn release_tag(name: &TemplateName, version: &str) -> String {
    format!("{name}-v{version}")
}

/// Public download URL of a release asset.
#[must_use]
pub fn download_url(repo: &str, tag: &str, filename: &str) -> String {
    format!("https://github.com/{repo}/releases/download/{tag}/{filename}")
}

/// A release to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Target repository, `owner/name`.
    pub repo: String,
    /// Release tag.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Release notes.
    pub notes: String,
    /// Files uploaded as assets.
    pub files: Vec<PathBuf>,
}

/// Publishing failures.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The release CLI could not be run or timed out.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The release host rejected the request.
    #[error("failed to {action} release {tag}: {stderr}")]
    Rejected {
        /// What was attempted.
        action: &'static str,
        /// Release tag.
        tag: String,
        /// CLI stderr.
        stderr: String,
    },
}

/// Creates and removes releases.
pub trait Publisher {
    /// Delete the release tagged `tag` and its tag. A missing release is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] for any other failure.
    fn delete_release(&self, repo: &str, tag: &str) -> Result<(), PublishError>;

    /// Create a release and upload its files.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the release cannot be created.
    fn create_release(&self, release: &ReleaseRequest) -> Result<(), PublishError>;
}

/// Publisher driving the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhPublisher<E> {
    executor: E,
}

impl<E: CommandExecutor> GhPublisher<E> {
    /// Publisher invoking `gh` through `executor`.
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor> Publisher for GhPublisher<E> {
    fn delete_release(&self, repo: &str, tag: &str) -> Result<(), PublishError> {
        let line = CommandLine::new("gh")
            .args(["release", "delete", tag, "--repo", repo, "--yes", "--cleanup-tag"])
            .timeout(PUBLISH_TIMEOUT);
        let output = self.executor.run(&line)?;
        let stderr = stderr_text(&output);
        if output.status.success() || stderr.to_ascii_lowercase().contains("not found") {
            return Ok(());
        }
        Err(PublishError::Rejected {
            action: "delete",
            tag: tag.to_owned(),
            stderr,
        })
    }

    fn create_release(&self, release: &ReleaseRequest) -> Result<(), PublishError> {
        let line = CommandLine::new("gh")
            .args(["release", "create", release.tag.as_str()])
            .args(release.files.iter().map(|f| f.to_string_lossy().into_owned()))
            .args([
                "--repo",
                release.repo.as_str(),
                "--title",
                release.title.as_str(),
                "--notes",
                release.notes.as_str(),
            ])
            .timeout(PUBLISH_TIMEOUT);
        log::info!("publishing {} to {}", release.tag, release.repo);
        let output = self.executor.run(&line)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(PublishError::Rejected {
                action: "create",
                tag: release.tag.clone(),
                stderr: stderr_text(&output),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};

    const DELETE: &[&str] = &[
        "release",
        "delete",
        "demo-v1.0.0",
        "--repo",
        "Presto-io/templates",
        "--yes",
        "--cleanup-tag",
    ];

    #[test]
    fn missing_release_is_not_an_error() {
        let publisher = GhPublisher::new(StubExecutor::new(vec![ExpectedCall::new(
            "gh",
            DELETE,
            Ok(failure_output("release not found")),
        )]));
        publisher
            .delete_release("Presto-io/templates", "demo-v1.0.0")
            .expect("not found is ignored");
    }

    #[test]
    fn other_delete_failures_are_reported() {
        let publisher = GhPublisher::new(StubExecutor::new(vec![ExpectedCall::new(
            "gh",
            DELETE,
            Ok(failure_output("HTTP 403: forbidden")),
        )]));
        let err = publisher
            .delete_release("Presto-io/templates", "demo-v1.0.0")
            .expect_err("fails");
        assert!(matches!(err, PublishError::Rejected { action: "delete", .. }));
    }

    #[test]
    fn create_uploads_every_file() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "gh",
            &[
                "release",
                "create",
                "demo-v1.0.0",
                "/tmp/a",
                "/tmp/SHA256SUMS",
                "--repo",
                "Presto-io/templates",
                "--title",
                "demo 1.0.0",
                "--notes",
                "built",
            ],
            Ok(success_output()),
        )]);
        let publisher = GhPublisher::new(&executor);
        publisher
            .create_release(&ReleaseRequest {
                repo: "Presto-io/templates".to_owned(),
                tag: "demo-v1.0.0".to_owned(),
                title: "demo 1.0.0".to_owned(),
                notes: "built".to_owned(),
                files: vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/SHA256SUMS")],
            })
            .expect("create");
        executor.assert_finished();
    }

    #[test]
    fn tags_and_urls_follow_release_layout() {
        let name = TemplateName::try_from("demo").expect("valid");
        let tag = release_tag(&name, "1.2.0");
        assert_eq!(tag, "demo-v1.2.0");
        assert_eq!(
            download_url("o/r", &tag, "SHA256SUMS"),
            "https://github.com/o/r/releases/download/demo-v1.2.0/SHA256SUMS"
        );
    }
}
