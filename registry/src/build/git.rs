//! Pinned, shallow clones of verified sources.

use crate::command::{CommandExecutor, CommandLine, stderr_text};
use crate::error::TemplateError;
use std::path::Path;
use std::time::Duration;

/// Timeout for each git operation (5 minutes).
const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetch exactly `rev` of `url` into `dest` without history.
///
/// `dest` must exist and be empty. The checkout is detached at the fetched
/// commit.
///
/// # Errors
///
/// Returns [`TemplateError::Validation`] for a revision that could be
/// mistaken for an option, and [`TemplateError::Build`] when any git step
/// fails or times out.
pub fn clone_pinned(
    executor: &dyn CommandExecutor,
    url: &str,
    rev: &str,
    dest: &Path,
) -> Result<(), TemplateError> {
    validate_rev(rev)?;
    run_git(executor, dest, &["init", "--quiet"])?;
    run_git(executor, dest, &["fetch", "--quiet", "--depth", "1", url, rev])?;
    run_git(executor, dest, &["checkout", "--quiet", "FETCH_HEAD"])?;
    Ok(())
}

fn validate_rev(rev: &str) -> Result<(), TemplateError> {
    let acceptable = !rev.is_empty()
        && !rev.starts_with('-')
        && rev
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'));
    if acceptable {
        Ok(())
    } else {
        Err(TemplateError::Validation {
            reason: format!("unsafe git revision {rev:?}"),
        })
    }
}

fn run_git(executor: &dyn CommandExecutor, dir: &Path, args: &[&str]) -> Result<(), TemplateError> {
    let line = CommandLine::new("git")
        .args(args.iter().copied())
        .current_dir(dir)
        .timeout(GIT_TIMEOUT);
    let output = executor.run(&line).map_err(|e| TemplateError::Build {
        stage: "clone",
        reason: e.to_string(),
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(TemplateError::Build {
            stage: "clone",
            reason: format!("`{line}` failed: {}", stderr_text(&output)),
        })
    }
}
