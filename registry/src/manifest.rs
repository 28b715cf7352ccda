//! Template-declared manifest, as printed by `<binary> --manifest`.
//!
//! Only a handful of fields matter to the registry; everything else is kept
//! in [`TemplateManifest::extra`] and written back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A template's self-description.
///
/// # Examples
///
/// ```
/// use presto_registry::manifest::TemplateManifest;
///
/// let manifest = TemplateManifest::from_json(
///     r#"{"name":"gongwen","displayName":"公文","fields":{"title":"string"}}"#.as_bytes(),
/// )
/// .expect("valid manifest");
/// assert_eq!(manifest.display_name.as_deref(), Some("公文"));
/// assert!(manifest.extra.contains_key("fields"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateManifest {
    /// Declared template name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Category id, e.g. `government`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// SPDX license expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Oldest Presto release the template supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_presto_version: Option<String>,
    /// Every other key, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TemplateManifest {
    /// Parse manifest bytes. The document must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the bytes are not a manifest object or a
    /// well-known field has the wrong type.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Category id, defaulting to `other`.
    #[must_use]
    pub fn category_or_default(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(crate::registry::DEFAULT_CATEGORY)
    }
}
