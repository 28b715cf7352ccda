//! Network isolation for sandboxed children.
//!
//! On Linux an unprivileged user can usually create a private network
//! namespace with `unshare --net --map-root-user`. The namespace has only a
//! downed loopback device, so the child has no network. Whether this works
//! depends on kernel settings, so it is probed once per run.

use super::{SANDBOX_PATH, SandboxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;
use wait_timeout::ChildExt;

const UNSHARE: &str = "unshare";
const UNSHARE_ARGS: [&str; 3] = ["--net", "--map-root-user", "--"];
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How strictly network isolation is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Use a network namespace when the host supports it.
    #[default]
    Auto,
    /// Refuse to run without a network namespace.
    Required,
    /// Never create a namespace.
    Disabled,
}

impl IsolationMode {
    /// Lowercase name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Required => "required",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "required" => Ok(Self::Required),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown isolation mode '{other}' (expected auto, required or disabled)"
            )),
        }
    }
}

/// The isolation actually applied to children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkIsolation {
    /// Children run in a private network namespace.
    Namespace,
    /// Children share the host network.
    Host,
}

impl NetworkIsolation {
    /// Resolve `mode` against the host by probing `unshare`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::IsolationUnavailable`] when `mode` is
    /// [`IsolationMode::Required`] and the probe fails.
    pub fn detect(mode: IsolationMode) -> Result<Self, SandboxError> {
        Self::resolve(mode, probe_unshare)
    }

    /// Resolve `mode` using the supplied availability probe.
    ///
    /// The probe is not called when isolation is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::IsolationUnavailable`] when `mode` is
    /// [`IsolationMode::Required`] and the probe reports unavailability.
    pub fn resolve(
        mode: IsolationMode,
        probe: impl FnOnce() -> bool,
    ) -> Result<Self, SandboxError> {
        let available = mode != IsolationMode::Disabled && probe();
        match (mode, available) {
            (IsolationMode::Disabled, _) => Ok(Self::Host),
            (IsolationMode::Auto | IsolationMode::Required, true) => Ok(Self::Namespace),
            (IsolationMode::Auto, false) => {
                log::warn!(
                    "network namespaces unavailable; template binaries will share the host network"
                );
                Ok(Self::Host)
            }
            (IsolationMode::Required, false) => Err(SandboxError::IsolationUnavailable {
                reason: format!("`{UNSHARE} --net --map-root-user` is not permitted on this host"),
            }),
        }
    }

    /// Build the base command for `program` under this isolation.
    #[must_use]
    pub fn command(self, program: &Path) -> Command {
        match self {
            Self::Host => Command::new(program),
            Self::Namespace => {
                let mut command = Command::new(UNSHARE);
                command.args(UNSHARE_ARGS).arg(program);
                command
            }
        }
    }
}

/// Whether an unprivileged network namespace can be created.
fn probe_unshare() -> bool {
    if !cfg!(target_os = "linux") {
        return false;
    }
    let spawned = Command::new(UNSHARE)
        .args(UNSHARE_ARGS)
        .arg("true")
        .env_clear()
        .env("PATH", SANDBOX_PATH)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let Ok(mut child) = spawned else {
        return false;
    };
    match child.wait_timeout(PROBE_TIMEOUT) {
        Ok(Some(status)) => status.success(),
        Ok(None) | Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            false
        }
    }
}
