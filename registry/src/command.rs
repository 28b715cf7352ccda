//! Timeout-bounded execution of trusted host tools.
//!
//! `git`, `docker`, `gh` and `typst` are invoked through [`CommandExecutor`]
//! so the pipeline stages can be tested against a scripted stub. Unlike the
//! sandbox, these commands inherit the host environment (they need
//! credentials and the container socket).

use crate::sandbox::capture::{CaptureError, collect_capture, spawn_capture};
use crate::sandbox::group;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default timeout for host commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Output retained per stream from host commands.
const HOST_OUTPUT_LIMIT: usize = 16 * 1024 * 1024;

/// Time allowed for output pipes to close after the command exits.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A host command line with its working directory and timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when absent.
    pub current_dir: Option<PathBuf>,
    /// Wall-clock limit.
    pub timeout: Duration,
}

impl CommandLine {
    /// Start a command line for `program` with the default timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Override the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Failures starting or waiting on a host command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The command exceeded its timeout and was killed.
    #[error("`{command}` timed out after {} seconds", timeout.as_secs())]
    TimedOut {
        /// The rendered command line.
        command: String,
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// Waiting on the command or reading its output failed.
    #[error("I/O error running command: {0}")]
    Io(#[from] io::Error),
}

/// Abstraction for running trusted host commands.
pub trait CommandExecutor {
    /// Runs a command and returns its captured output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// `status` and decide.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command cannot start or times out.
    fn run(&self, command: &CommandLine) -> Result<Output, CommandError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn run(&self, command: &CommandLine) -> Result<Output, CommandError> {
        (**self).run(command)
    }
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &CommandLine) -> Result<Output, CommandError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }
        group::isolate(&mut cmd);

        log::debug!("exec: {command}");
        let deadline = Instant::now() + command.timeout;
        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .map(|pipe| spawn_capture(pipe, HOST_OUTPUT_LIMIT));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| spawn_capture(pipe, HOST_OUTPUT_LIMIT));

        let timed_out = || CommandError::TimedOut {
            command: command.to_string(),
            timeout: command.timeout,
        };
        let Some(status) = child.wait_timeout(command.timeout)? else {
            group::kill_and_reap(&mut child);
            return Err(timed_out());
        };

        // A daemonised helper may keep the pipes open; do not wait on it.
        let drain_by = deadline.max(Instant::now() + DRAIN_GRACE);
        let collect = |capture| match collect_capture(capture, drain_by) {
            Ok(captured) => Ok(captured.bytes),
            Err(CaptureError::Deadline) => {
                group::kill(&child);
                Err(timed_out())
            }
            Err(CaptureError::Io(e)) => Err(CommandError::Io(e)),
        };
        Ok(Output {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        })
    }
}

/// Trimmed, lossily decoded stderr of `output`, for error messages.
#[must_use]
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}
