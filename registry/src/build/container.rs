//! Container runtime seam for the verified build.
//!
//! Every container step is described by a [`ContainerSpec`] and executed
//! through a [`ContainerRuntime`]. [`DockerRuntime`] renders specs into
//! `docker run` invocations over a [`CommandExecutor`].

use crate::command::{CommandError, CommandExecutor, CommandLine, stderr_text};
use std::time::Duration;
use thiserror::Error;

/// Timeout for volume management commands.
const VOLUME_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for force-removing a container left behind by a timeout.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// A volume or bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Volume name or absolute host path.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl Mount {
    /// Read-only mount.
    #[must_use]
    pub fn read_only(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: true,
        }
    }

    /// Read-write mount.
    #[must_use]
    pub fn read_write(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    fn render(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.source, self.target)
        } else {
            format!("{}:{}", self.source, self.target)
        }
    }
}

/// One container invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Pipeline step, for diagnostics.
    pub step: &'static str,
    /// Container name, so a timed-out run can be removed by name.
    pub name: Option<String>,
    /// `uid:gid` the command runs as.
    pub user: Option<String>,
    /// Image reference.
    pub image: String,
    /// Command and arguments run in the container.
    pub command: Vec<String>,
    /// Mounts in order.
    pub mounts: Vec<Mount>,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Whether the container gets network access.
    pub network: bool,
    /// Mount the root filesystem read-only.
    pub read_only_root: bool,
    /// tmpfs mount points.
    pub tmpfs: Vec<String>,
    /// Memory limit, e.g. `2g`.
    pub memory: Option<String>,
    /// CPU limit, e.g. `2`.
    pub cpus: Option<String>,
    /// Wall-clock limit for the whole invocation.
    pub timeout: Duration,
}

impl ContainerSpec {
    /// Start a network-isolated spec.
    #[must_use]
    pub fn new(step: &'static str, image: impl Into<String>, timeout: Duration) -> Self {
        Self {
            step,
            name: None,
            user: None,
            image: image.into(),
            command: Vec::new(),
            mounts: Vec::new(),
            env: Vec::new(),
            workdir: None,
            network: false,
            read_only_root: false,
            tmpfs: Vec::new(),
            memory: None,
            cpus: None,
            timeout,
        }
    }

    /// Name the container.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Run the command as `user`, given as `uid:gid`.
    #[must_use]
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the command.
    #[must_use]
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Add a mount.
    #[must_use]
    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Allow network access.
    #[must_use]
    pub const fn with_network(mut self) -> Self {
        self.network = true;
        self
    }

    /// Harden the container: read-only root with a writable `/tmp`.
    #[must_use]
    pub fn hardened(mut self) -> Self {
        self.read_only_root = true;
        self.tmpfs.push("/tmp".to_owned());
        self
    }

    /// Apply resource limits.
    #[must_use]
    pub fn limits(mut self, memory: impl Into<String>, cpus: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self.cpus = Some(cpus.into());
        self
    }

    /// Render as `docker run` arguments.
    #[must_use]
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_owned(), "--rm".to_owned()];
        if let Some(name) = &self.name {
            args.extend(["--name".to_owned(), name.clone()]);
        }
        if let Some(user) = &self.user {
            args.extend(["--user".to_owned(), user.clone()]);
        }
        if !self.network {
            args.extend(["--network".to_owned(), "none".to_owned()]);
        }
        if self.read_only_root {
            args.push("--read-only".to_owned());
        }
        for path in &self.tmpfs {
            args.extend(["--tmpfs".to_owned(), path.clone()]);
        }
        if let Some(memory) = &self.memory {
            args.extend(["--memory".to_owned(), memory.clone()]);
        }
        if let Some(cpus) = &self.cpus {
            args.extend(["--cpus".to_owned(), cpus.clone()]);
        }
        for mount in &self.mounts {
            args.extend(["-v".to_owned(), mount.render()]);
        }
        for (key, value) in &self.env {
            args.extend(["-e".to_owned(), format!("{key}={value}")]);
        }
        if let Some(dir) = &self.workdir {
            args.extend(["-w".to_owned(), dir.clone()]);
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Captured output of a successful container run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOutput {
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

/// Container runtime failures.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The runtime CLI could not be run or timed out.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The runtime reported failure.
    #[error("{step} failed: {stderr}")]
    Failed {
        /// Pipeline step.
        step: &'static str,
        /// Runtime stderr.
        stderr: String,
    },
}

/// Creates volumes and runs containers.
pub trait ContainerRuntime {
    /// Create a named volume.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError`] when the runtime refuses.
    fn create_volume(&self, name: &str) -> Result<(), ContainerError>;

    /// Remove a named volume.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError`] when the runtime refuses.
    fn remove_volume(&self, name: &str) -> Result<(), ContainerError>;

    /// Run one container to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Failed`] on a non-zero exit, or
    /// [`ContainerError::Command`] when the runtime cannot be run or the
    /// spec's timeout expires.
    fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, ContainerError>;
}

/// Docker CLI runtime.
#[derive(Debug, Clone)]
pub struct DockerRuntime<E> {
    executor: E,
    program: String,
}

impl<E: CommandExecutor> DockerRuntime<E> {
    /// Runtime invoking `docker` through `executor`.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            program: "docker".to_owned(),
        }
    }

    fn invoke(&self, step: &'static str, line: &CommandLine) -> Result<ContainerOutput, ContainerError> {
        let output = self.executor.run(line)?;
        if !output.status.success() {
            return Err(ContainerError::Failed {
                step,
                stderr: stderr_text(&output),
            });
        }
        Ok(ContainerOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

impl<E: CommandExecutor> ContainerRuntime for DockerRuntime<E> {
    fn create_volume(&self, name: &str) -> Result<(), ContainerError> {
        let line = CommandLine::new(&self.program)
            .args(["volume", "create", name])
            .timeout(VOLUME_TIMEOUT);
        self.invoke("create-volume", &line).map(|_| ())
    }

    fn remove_volume(&self, name: &str) -> Result<(), ContainerError> {
        let line = CommandLine::new(&self.program)
            .args(["volume", "rm", "-f", name])
            .timeout(VOLUME_TIMEOUT);
        self.invoke("remove-volume", &line).map(|_| ())
    }

    fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, ContainerError> {
        log::debug!("container step {} ({})", spec.step, spec.image);
        let line = CommandLine::new(&self.program)
            .args(spec.docker_args())
            .timeout(spec.timeout);
        let result = self.invoke(spec.step, &line);
        if let (Err(ContainerError::Command(CommandError::TimedOut { .. })), Some(name)) =
            (&result, &spec.name)
        {
            // The CLI was killed but the daemon keeps the container running.
            self.force_remove(name);
        }
        result
    }
}

impl<E: CommandExecutor> DockerRuntime<E> {
    fn force_remove(&self, name: &str) {
        log::warn!("removing timed-out container {name}");
        let line = CommandLine::new(&self.program)
            .args(["rm", "-f", name])
            .timeout(REMOVE_TIMEOUT);
        if let Err(e) = self.invoke("remove-container", &line) {
            log::warn!("failed to remove container {name}: {e}");
        }
    }
}
