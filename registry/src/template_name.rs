//! Validated template identifiers.
//!
//! A template name flows into filesystem paths, container volume names,
//! release tags, and sandbox arguments, so it is validated before any network
//! fetch or execution happens. The accepted grammar is lowercase ASCII
//! alphanumerics separated by single internal hyphens.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum accepted length of a template name.
const MAX_LEN: usize = 64;

/// Reasons a template name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid template name \"{value}\": {reason}")]
pub struct TemplateNameError {
    /// The rejected input.
    pub value: String,
    /// Which rule the input violated.
    pub reason: String,
}

/// A template name matching `^[a-z0-9]+(-[a-z0-9]+)*$`.
///
/// # Examples
///
/// ```
/// use presto_registry::template_name::TemplateName;
///
/// let name: TemplateName = "jiaoan-shicao".try_into().expect("valid name");
/// assert_eq!(name.as_str(), "jiaoan-shicao");
/// assert!(TemplateName::try_from("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateName(String);

impl TemplateName {
    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for TemplateName {
    type Error = TemplateNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for TemplateName {
    type Error = TemplateNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(&value)?;
        Ok(Self(value))
    }
}

impl From<TemplateName> for String {
    fn from(name: TemplateName) -> Self {
        name.0
    }
}

impl AsRef<str> for TemplateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn reject(value: &str, reason: impl Into<String>) -> TemplateNameError {
    TemplateNameError {
        value: value.to_owned(),
        reason: reason.into(),
    }
}

fn validate(value: &str) -> Result<(), TemplateNameError> {
    if value.is_empty() {
        return Err(reject(value, "name must not be empty"));
    }
    if value.len() > MAX_LEN {
        return Err(reject(
            value,
            format!("name must be at most {MAX_LEN} characters"),
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(reject(value, format!("character '{bad}' is not allowed")));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(reject(value, "name must not start or end with '-'"));
    }
    if value.contains("--") {
        return Err(reject(value, "name must not contain consecutive '-'"));
    }
    Ok(())
}
