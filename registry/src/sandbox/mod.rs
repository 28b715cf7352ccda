//! Untrusted execution sandbox.
//!
//! Template binaries are fetched from third parties and may be hostile. They
//! are only ever launched through an [`ExecutionSandbox`], which clears the
//! environment, confines the working directory to a throwaway temporary
//! directory, bounds captured output, enforces a wall-clock timeout, and (on
//! Linux, when available) places the child in a fresh network namespace.
//! The child leads its own process group; whatever it forks is killed with
//! it when it exits or times out.

pub mod capture;
pub mod group;
pub mod isolation;
pub mod process;

pub use isolation::{IsolationMode, NetworkIsolation};
pub use process::ProcessSandbox;

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The only environment variable passed to sandboxed children.
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Default wall-clock limit for one sandboxed invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for `--manifest` output.
pub const MANIFEST_LIMIT: usize = 1024 * 1024;

/// Upper bound for `--example` output.
pub const EXAMPLE_LIMIT: usize = 1024 * 1024;

/// Upper bound for a converted document.
pub const DOCUMENT_LIMIT: usize = 10 * 1024 * 1024;

/// stderr retained for diagnostics.
pub const STDERR_LIMIT: usize = 64 * 1024;

/// One invocation of an untrusted executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Path of the executable.
    pub program: PathBuf,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, which is closed afterwards.
    pub stdin: Option<Vec<u8>>,
    /// Maximum stdout size accepted.
    pub output_limit: usize,
    /// Wall-clock limit.
    pub timeout: Duration,
}

impl ExecRequest {
    /// Create a request with the default timeout and the manifest output limit.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            stdin: None,
            output_limit: MANIFEST_LIMIT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Pipe `bytes` into the child's stdin.
    #[must_use]
    pub fn with_stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// Override the stdout limit.
    #[must_use]
    pub const fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    /// Override the wall-clock limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program path for log and error messages.
    #[must_use]
    pub fn program_display(&self) -> String {
        self.program.display().to_string()
    }
}

/// Captured result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the child (zero on success).
    pub exit_code: i32,
    /// Captured stdout, within the request's limit.
    pub stdout: Vec<u8>,
    /// Captured stderr, within [`STDERR_LIMIT`].
    pub stderr: Vec<u8>,
}

/// Failures of a sandboxed invocation.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The executable could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Path of the executable.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The child exceeded its wall-clock limit and was killed.
    #[error("{program} timed out after {} seconds", timeout.as_secs())]
    Timeout {
        /// Path of the executable.
        program: String,
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// The child wrote more than the permitted stdout.
    #[error("{program} produced more than {limit} bytes of output")]
    OutputTooLarge {
        /// Path of the executable.
        program: String,
        /// The limit that was exceeded.
        limit: usize,
    },

    /// The child exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}")))]
    NonZeroExit {
        /// Path of the executable.
        program: String,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Truncated stderr for diagnostics.
        stderr: String,
    },

    /// Network isolation was required but is not available on this host.
    #[error("network isolation required but unavailable: {reason}")]
    IsolationUnavailable {
        /// Why the probe failed.
        reason: String,
    },

    /// Plumbing around the child failed.
    #[error("sandbox I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Runs untrusted executables under isolation.
pub trait ExecutionSandbox {
    /// Run one invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`SandboxError`] when the child cannot start, times out,
    /// overflows its output limit, or exits unsuccessfully.
    fn run(&self, request: &ExecRequest) -> Result<ExecOutput, SandboxError>;
}
