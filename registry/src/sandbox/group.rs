//! Process-group confinement for spawned children.
//!
//! Children are started as leaders of a fresh process group, so anything
//! they fork (and do not explicitly move out with `setsid`) can be killed
//! together with them.

use std::process::{Child, Command};

/// Start the child of `command` in its own process group.
pub fn isolate(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = command;
    }
}

/// `SIGKILL` every process still in `child`'s group.
///
/// Safe to call after the leader has exited: a group with no members left
/// reports `ESRCH`, which is ignored.
pub fn kill(child: &Child) {
    #[cfg(unix)]
    {
        let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
            return;
        };
        // SAFETY: `killpg` only sends a signal and touches no memory.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            log::trace!(
                "process group {pgid} already gone: {}",
                std::io::Error::last_os_error()
            );
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Kill the whole group, then reap the leader if it is still running.
pub fn kill_and_reap(child: &mut Child) {
    kill(child);
    let _ = child.kill();
    let _ = child.wait();
}
