//! Error types for the registry pipeline.
//!
//! Two levels exist. [`TemplateError`] describes why one template could not
//! be processed; it is logged, counted, and the run moves on. [`RegistryError`]
//! describes conditions that make the whole run meaningless, such as an
//! unreadable registry or configuration.

use crate::build::container::ContainerError;
use crate::build::publish::PublishError;
use crate::candidate::CandidateListError;
use crate::checksum::{ChecksumError, Sha256Digest};
use crate::command::CommandError;
use crate::config::ConfigError;
use crate::metadata::MetadataError;
use crate::preview::PreviewError;
use crate::registry::RegistryFileError;
use crate::sandbox::SandboxError;
use crate::source::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Why one template failed.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// An upstream request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A template binary or build tool could not be started.
    #[error("launch failed: {reason}")]
    Launch {
        /// Description of the failure.
        reason: String,
    },

    /// A step exceeded its wall-clock limit.
    #[error("{step} timed out after {secs} seconds")]
    Timeout {
        /// The step that timed out.
        step: String,
        /// The limit in seconds.
        secs: u64,
    },

    /// An output or artifact exceeded its size bound.
    #[error("{what} exceeds the {limit}-byte limit")]
    SizeLimitExceeded {
        /// What was too large.
        what: String,
        /// The bound in bytes.
        limit: u64,
    },

    /// An artifact did not match its expected digest and was deleted.
    #[error("digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The artifact filename.
        file: String,
        /// Digest the publisher claimed.
        expected: Sha256Digest,
        /// Digest of the bytes received.
        actual: Sha256Digest,
    },

    /// A template binary exited unsuccessfully.
    #[error("{program} exited unsuccessfully ({}): {stderr}", code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}")))]
    Execution {
        /// The binary that failed.
        program: String,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Truncated stderr.
        stderr: String,
    },

    /// Harvested data was malformed.
    #[error("validation failed: {reason}")]
    Validation {
        /// Description of the problem.
        reason: String,
    },

    /// A verified build step failed.
    #[error("build failed at {stage}: {reason}")]
    Build {
        /// Pipeline stage name.
        stage: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// Publishing the release failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The main preview failed to compile.
    #[error(transparent)]
    Preview(#[from] PreviewError),

    /// No usable binary exists for a required platform.
    #[error("no usable binary for {platform}")]
    MissingPlatform {
        /// Platform key, `os-arch`.
        platform: String,
    },

    /// Hashing an artifact failed.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// Reading or writing the template record failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// A local I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SandboxError> for TemplateError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Launch { program, source } => Self::Launch {
                reason: format!("{program}: {source}"),
            },
            SandboxError::Timeout { program, timeout } => Self::Timeout {
                step: program,
                secs: timeout.as_secs(),
            },
            SandboxError::OutputTooLarge { program, limit } => Self::SizeLimitExceeded {
                what: format!("output of {program}"),
                limit: u64::try_from(limit).unwrap_or(u64::MAX),
            },
            SandboxError::NonZeroExit {
                program,
                code,
                stderr,
            } => Self::Execution {
                program,
                code,
                stderr,
            },
            SandboxError::IsolationUnavailable { reason } => Self::Launch { reason },
            SandboxError::Io(e) => Self::Io(e),
        }
    }
}

impl From<CommandError> for TemplateError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Spawn { program, source } => Self::Launch {
                reason: format!("{program}: {source}"),
            },
            CommandError::TimedOut { command, timeout } => Self::Timeout {
                step: command,
                secs: timeout.as_secs(),
            },
            CommandError::Io(e) => Self::Io(e),
        }
    }
}

impl From<ContainerError> for TemplateError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::Command(inner) => inner.into(),
            ContainerError::Failed { step, stderr } => Self::Build {
                stage: step,
                reason: stderr,
            },
        }
    }
}

/// Conditions that abort the whole run.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The candidate list is missing or unreadable.
    #[error(transparent)]
    Candidates(#[from] CandidateListError),

    /// `registry.json` could not be read or written.
    #[error(transparent)]
    RegistryFile(#[from] RegistryFileError),

    /// The output directory could not be listed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The sandbox cannot provide the required isolation.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The host platform is not one the registry builds for.
    #[error("unsupported host platform {os}/{arch}")]
    UnsupportedHost {
        /// Host operating system.
        os: &'static str,
        /// Host architecture.
        arch: &'static str,
    },

    /// The deploy mirror could not be synchronised.
    #[error("failed to sync {}: {source}", path.display())]
    Deploy {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for run-level operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sandbox_timeouts_become_template_timeouts() {
        let err: TemplateError = SandboxError::Timeout {
            program: "/tmp/bin".to_owned(),
            timeout: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, TemplateError::Timeout { secs: 30, .. }));
    }

    #[test]
    fn oversized_output_becomes_size_limit() {
        let err: TemplateError = SandboxError::OutputTooLarge {
            program: "/tmp/bin".to_owned(),
            limit: 1024,
        }
        .into();
        assert!(matches!(err, TemplateError::SizeLimitExceeded { limit: 1024, .. }));
    }

    #[test]
    fn container_failures_name_the_stage() {
        let err: TemplateError = ContainerError::Failed {
            step: "fetch-dependencies",
            stderr: "go: module not found".to_owned(),
        }
        .into();
        let message = err.to_string();
        assert!(message.contains("fetch-dependencies"));
        assert!(message.contains("module not found"));
    }
}
