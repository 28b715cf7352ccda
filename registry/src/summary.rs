//! Per-run tally of processed templates.

use crate::error::TemplateError;
use crate::template_name::TemplateName;
use std::fmt;

/// A template that did not make it through a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Template name.
    pub name: TemplateName,
    /// Stage that gave up on it.
    pub stage: &'static str,
    /// Why.
    pub reason: String,
}

/// Outcome of one run.
///
/// A failed template never aborts the run. It is recorded here and the
/// next template is processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Templates processed successfully, in processing order.
    pub succeeded: Vec<TemplateName>,
    /// Templates skipped or failed.
    pub skipped: Vec<Skipped>,
}

impl RunSummary {
    /// Record a success.
    pub fn succeed(&mut self, name: &TemplateName) {
        self.succeeded.push(name.clone());
    }

    /// Record a template that was not processed, without it being an error.
    pub fn skip(&mut self, name: &TemplateName, stage: &'static str, reason: impl Into<String>) {
        let why = reason.into();
        log::info!("{stage}: skipped {name}: {why}");
        self.skipped.push(Skipped {
            name: name.clone(),
            stage,
            reason: why,
        });
    }

    /// Record a failure and log it.
    pub fn fail(&mut self, name: &TemplateName, stage: &'static str, error: &TemplateError) {
        log::warn!("{stage}: {name} failed: {error}");
        self.skipped.push(Skipped {
            name: name.clone(),
            stage,
            reason: error.to_string(),
        });
    }

    /// Fold another stage's summary into this one.
    pub fn absorb(&mut self, other: Self) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
    }

    /// Whether nothing was skipped.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped",
            self.succeeded.len(),
            self.skipped.len()
        )?;
        for skipped in &self.skipped {
            write!(f, "\n  {} ({}): {}", skipped.name, skipped.stage, skipped.reason)?;
        }
        Ok(())
    }
}
