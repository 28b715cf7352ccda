//! Process-based sandbox implementation.

use super::capture::{CaptureError, Captured, collect_capture, spawn_capture};
use super::group;
use super::isolation::{IsolationMode, NetworkIsolation};
use super::{ExecOutput, ExecRequest, ExecutionSandbox, SANDBOX_PATH, STDERR_LIMIT, SandboxError};
use std::io::Write;
use std::process::{Child, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Time allowed for pipes to drain once the group has been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs untrusted executables as child processes.
///
/// The child gets an empty environment apart from `PATH`, a fresh temporary
/// working directory that is removed afterwards, and (when resolved to
/// [`NetworkIsolation::Namespace`]) a private network namespace.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSandbox {
    isolation: NetworkIsolation,
}

impl ProcessSandbox {
    /// Create a sandbox, probing the host for network isolation.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::IsolationUnavailable`] when `mode` requires
    /// isolation the host cannot provide.
    pub fn new(mode: IsolationMode) -> Result<Self, SandboxError> {
        let isolation = NetworkIsolation::detect(mode)?;
        log::debug!("sandbox network isolation: {isolation:?}");
        Ok(Self { isolation })
    }

    /// Create a sandbox with an already-resolved isolation level.
    #[must_use]
    pub const fn with_isolation(isolation: NetworkIsolation) -> Self {
        Self { isolation }
    }

    /// The isolation applied to children.
    #[must_use]
    pub const fn isolation(&self) -> NetworkIsolation {
        self.isolation
    }
}

impl ExecutionSandbox for ProcessSandbox {
    fn run(&self, request: &ExecRequest) -> Result<ExecOutput, SandboxError> {
        let program = request.program_display();
        let workdir = tempfile::tempdir()?;

        let mut command = self.isolation.command(&request.program);
        command
            .args(&request.args)
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .current_dir(workdir.path())
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        group::isolate(&mut command);

        log::debug!("sandbox: {program} {}", request.args.join(" "));
        let deadline = Instant::now() + request.timeout;
        let mut child = command.spawn().map_err(|source| SandboxError::Launch {
            program: program.clone(),
            source,
        })?;

        feed_stdin(&mut child, request.stdin.clone());
        let stdout = child
            .stdout
            .take()
            .map(|pipe| spawn_capture(pipe, request.output_limit));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| spawn_capture(pipe, STDERR_LIMIT));

        let timed_out = || SandboxError::Timeout {
            program: program.clone(),
            timeout: request.timeout,
        };
        let status = match child.wait_timeout(request.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                group::kill_and_reap(&mut child);
                return Err(timed_out());
            }
            Err(e) => {
                group::kill_and_reap(&mut child);
                return Err(SandboxError::Io(e));
            }
        };
        // Background jobs the template left behind die with it.
        group::kill(&child);

        let drain_by = deadline.max(Instant::now() + DRAIN_GRACE);
        let collect = |capture| match collect_capture(capture, drain_by) {
            Ok(captured) => Ok(captured),
            Err(CaptureError::Deadline) => Err(timed_out()),
            Err(CaptureError::Io(e)) => Err(SandboxError::Io(e)),
        };
        let out: Captured = collect(stdout)?;
        let err: Captured = collect(stderr)?;

        if out.truncated {
            return Err(SandboxError::OutputTooLarge {
                program,
                limit: request.output_limit,
            });
        }
        if !status.success() {
            return Err(SandboxError::NonZeroExit {
                program,
                code: status.code(),
                stderr: String::from_utf8_lossy(&err.bytes).trim().to_owned(),
            });
        }

        Ok(ExecOutput {
            exit_code: status.code().unwrap_or_default(),
            stdout: out.bytes,
            stderr: err.bytes,
        })
    }
}

/// Write stdin on a detached thread, then close the pipe.
///
/// A child that never reads stdin gets a broken pipe, which is ignored. The
/// writer is never joined; it ends when the last reader of the pipe dies.
fn feed_stdin(child: &mut Child, input: Option<Vec<u8>>) {
    let (Some(bytes), Some(mut pipe)) = (input, child.stdin.take()) else {
        return;
    };
    thread::spawn(move || {
        if let Err(e) = pipe.write_all(&bytes) {
            log::debug!("sandbox stdin closed early: {e}");
        }
    });
}
