//! The published registry index and its incremental merge.
//!
//! A run only touches the templates it discovered. [`merge`] folds the fresh
//! entries over the previously published index so untouched templates keep
//! their history, then rebuilds the derived category list.

use crate::metadata::{PlatformArtifact, TemplateMetadata};
use crate::template_name::TemplateName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version of `registry.json`.
pub const REGISTRY_VERSION: u32 = 1;

/// Category assigned to templates that declare none.
pub const DEFAULT_CATEGORY: &str = "other";

/// Timestamp format of `updatedAt`.
const UPDATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Known categories with their Chinese and English labels, in display order.
pub const CATEGORY_LABELS: [(&str, &str, &str); 8] = [
    ("government", "政务", "Government"),
    ("education", "教育", "Education"),
    ("business", "商务", "Business"),
    ("academic", "学术", "Academic"),
    ("legal", "法务", "Legal"),
    ("resume", "简历", "Resume"),
    ("creative", "创意", "Creative"),
    ("other", "其他", "Other"),
];

/// How far a template can be trusted.
///
/// Ordering follows precedence: `Official > Verified > Community`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trust {
    /// Third-party release binaries.
    Community,
    /// Built from pinned source by the verified pipeline.
    Verified,
    /// Published by the official organisation.
    Official,
}

impl Trust {
    /// Classify a template from its owner and whether it was built from source.
    #[must_use]
    pub fn classify(owner: &str, verified: bool, official_owner: &str) -> Self {
        if owner.eq_ignore_ascii_case(official_owner) {
            Self::Official
        } else if verified {
            Self::Verified
        } else {
            Self::Community
        }
    }
}

/// Display labels of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLabel {
    /// Chinese label.
    pub zh: String,
    /// English label.
    pub en: String,
}

/// A category that has at least one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category id.
    pub id: String,
    /// Display labels.
    pub label: CategoryLabel,
}

/// Public projection of one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Template name; unique within the registry.
    pub name: TemplateName,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Published version.
    #[serde(default)]
    pub version: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// Category id.
    #[serde(default = "default_category")]
    pub category: String,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// License expression.
    #[serde(default)]
    pub license: String,
    /// Trust level.
    pub trust: Trust,
    /// Owning account.
    #[serde(default)]
    pub owner: String,
    /// Built from source by the verified pipeline.
    #[serde(default)]
    pub verified: bool,
    /// Release publication time.
    #[serde(default)]
    pub published_at: String,
    /// Repository web page.
    #[serde(default)]
    pub repository: String,
    /// Binaries by platform key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub platforms: BTreeMap<String, PlatformArtifact>,
    /// Compiled preview files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<String>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

impl RegistryEntry {
    /// Project a metadata record into a registry entry.
    ///
    /// Descriptive fields come from the template's manifest; identity,
    /// version and provenance come from the record, since the manifest is
    /// self-declared.
    #[must_use]
    pub fn from_metadata(
        meta: &TemplateMetadata,
        previews: Vec<String>,
        official_owner: &str,
    ) -> Self {
        let manifest = meta.manifest.clone().unwrap_or_default();
        if let Some(declared) = manifest.name.as_deref()
            && declared != meta.name.as_str()
        {
            log::warn!(
                "{}: manifest declares name '{declared}'; keeping the release name",
                meta.name
            );
        }
        Self {
            name: meta.name.clone(),
            display_name: manifest.display_name.clone().unwrap_or_default(),
            description: manifest.description.clone().unwrap_or_default(),
            version: meta.version.clone(),
            author: manifest.author.clone().unwrap_or_default(),
            category: manifest.category_or_default().to_owned(),
            keywords: manifest.keywords.clone(),
            license: manifest.license.clone().unwrap_or_default(),
            trust: Trust::classify(&meta.owner, meta.verified, official_owner),
            owner: meta.owner.clone(),
            verified: meta.verified,
            published_at: meta.published_at.clone().unwrap_or_default(),
            repository: meta.html_url.clone(),
            platforms: meta.platforms.clone(),
            previews,
        }
    }

    /// Preference among entries sharing a name: higher trust, then the most
    /// recent publication, then the greatest version and repository.
    fn rank(&self) -> (Trust, &str, &str, &str) {
        (
            self.trust,
            self.published_at.as_str(),
            self.version.as_str(),
            self.repository.as_str(),
        )
    }
}

/// The persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// Schema version.
    pub version: u32,
    /// Time of the last merge.
    pub updated_at: String,
    /// Categories present in `templates`.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Templates, unique and sorted by name.
    #[serde(default)]
    pub templates: Vec<RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            updated_at: String::new(),
            categories: Vec::new(),
            templates: Vec::new(),
        }
    }
}

impl Registry {
    /// Recorded version of `name`, if present.
    #[must_use]
    pub fn version_of(&self, name: &TemplateName) -> Option<&str> {
        self.templates
            .iter()
            .find(|entry| &entry.name == name)
            .map(|entry| entry.version.as_str())
    }

    /// Recorded versions of every template.
    #[must_use]
    pub fn versions(&self) -> BTreeMap<TemplateName, String> {
        self.templates
            .iter()
            .map(|entry| (entry.name.clone(), entry.version.clone()))
            .collect()
    }

    /// Load the registry at `path`; a missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFileError`] if the file exists but cannot be read
    /// or parsed. Continuing would silently drop every published template.
    pub fn load(path: &Path) -> Result<Self, RegistryFileError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("no registry at {}; starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(RegistryFileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let registry: Self =
            serde_json::from_str(&text).map_err(|source| RegistryFileError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        if registry.version != REGISTRY_VERSION {
            return Err(RegistryFileError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: registry.version,
            });
        }
        Ok(registry)
    }

    /// Write the registry to `path` atomically.
    ///
    /// The JSON is written to a temporary file in the same directory and
    /// renamed over `path`, so readers see either the old or the new index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFileError::Write`] on any I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), RegistryFileError> {
        let write_error = |source| RegistryFileError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_error)?;

        let mut json = serde_json::to_string_pretty(self)
            .map_err(io::Error::from)
            .map_err(write_error)?;
        json.push('\n');

        let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(write_error)?;
        file.write_all(json.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

/// Failures loading or saving `registry.json`. All are fatal for a run.
#[derive(Debug, Error)]
pub enum RegistryFileError {
    /// The file exists but could not be read.
    #[error("failed to read registry {}: {source}", path.display())]
    Read {
        /// Registry path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not a valid registry.
    #[error("registry {} is corrupt: {source}", path.display())]
    Corrupt {
        /// Registry path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file uses a schema this build does not understand.
    #[error("registry {} has unsupported version {version}", path.display())]
    UnsupportedVersion {
        /// Registry path.
        path: PathBuf,
        /// The version found.
        version: u32,
    },

    /// The registry could not be written.
    #[error("failed to write registry {}: {source}", path.display())]
    Write {
        /// Registry path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Fold `fresh` entries over `prior`.
///
/// Every fresh entry appears; prior entries whose names are absent from the
/// fresh set are carried over unchanged apart from trust, which is
/// recomputed for every entry that records an owner. When several fresh
/// entries share a name the highest-ranked one wins, so the result does not
/// depend on input order. Merging the same fresh set twice yields the same
/// templates.
#[must_use]
pub fn merge(
    prior: &Registry,
    fresh: &[RegistryEntry],
    official_owner: &str,
    updated_at: DateTime<Utc>,
) -> Registry {
    let reclassify = |entry: &RegistryEntry| {
        let mut entry = entry.clone();
        if !entry.owner.is_empty() {
            entry.trust = Trust::classify(&entry.owner, entry.verified, official_owner);
        }
        entry
    };

    let mut by_name: BTreeMap<TemplateName, RegistryEntry> = BTreeMap::new();
    for entry in fresh.iter().map(reclassify) {
        match by_name.get(&entry.name) {
            Some(existing) if existing.rank() >= entry.rank() => {}
            _ => {
                by_name.insert(entry.name.clone(), entry);
            }
        }
    }
    for entry in &prior.templates {
        if !by_name.contains_key(&entry.name) {
            by_name.insert(entry.name.clone(), reclassify(entry));
        }
    }
    let templates: Vec<RegistryEntry> = by_name.into_values().collect();

    Registry {
        version: REGISTRY_VERSION,
        updated_at: updated_at.format(UPDATED_AT_FORMAT).to_string(),
        categories: categories_for(&templates),
        templates,
    }
}

/// Known categories that occur in `templates`, in display order.
#[must_use]
pub fn categories_for(templates: &[RegistryEntry]) -> Vec<Category> {
    CATEGORY_LABELS
        .iter()
        .filter(|(id, _, _)| templates.iter().any(|t| t.category == *id))
        .map(|(id, zh, en)| Category {
            id: (*id).to_owned(),
            label: CategoryLabel {
                zh: (*zh).to_owned(),
                en: (*en).to_owned(),
            },
        })
        .collect()
}
