//! Per-template metadata records and their on-disk layout.
//!
//! Each processed template owns a directory `<output>/<name>/` holding
//! `meta.json` plus the harvested files. A record is replaced when the
//! template's version advances and is never deleted by the pipeline.

use crate::candidate::{Provenance, TemplateCandidate};
use crate::checksum::Sha256Digest;
use crate::manifest::TemplateManifest;
use crate::platform::{Arch, Os, Platform};
use crate::template_name::TemplateName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metadata record filename.
pub const META_FILE: &str = "meta.json";
/// Harvested manifest filename.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Harvested example filename.
pub const EXAMPLE_FILE: &str = "example.md";
/// Converted example document filename.
pub const DOCUMENT_FILE: &str = "output.typ";
/// README filename.
pub const README_FILE: &str = "README.md";
/// Prefix of compiled preview pages.
pub const PREVIEW_PREFIX: &str = "preview-";

/// One platform binary of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformArtifact {
    /// Target operating system.
    pub os: Os,
    /// Target architecture.
    pub arch: Arch,
    /// Download locator.
    pub url: String,
    /// Digest of the binary as downloaded or built.
    pub sha256: Sha256Digest,
    /// Whether the digest was confirmed against an expected value.
    pub verified: bool,
}

impl PlatformArtifact {
    /// The artifact's platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        Platform::new(self.os, self.arch)
    }
}

/// Files harvested for a template, by name within its directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedFiles {
    /// Example input (`example.md`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Converted document (`output.typ`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// README.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    /// Converted hero frames, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hero_frames: Vec<String>,
}

/// The durable record of one processed template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    /// Template name.
    pub name: TemplateName,
    /// Source repository, `owner/name`.
    pub repo: String,
    /// Owning account.
    pub owner: String,
    /// Release version.
    pub version: String,
    /// Release tag.
    pub tag: String,
    /// Release publication time.
    #[serde(default)]
    pub published_at: Option<String>,
    /// Repository web page.
    pub html_url: String,
    /// How the template entered the registry.
    pub provenance: Provenance,
    /// Built from source by the verified pipeline.
    #[serde(default)]
    pub verified: bool,
    /// Binaries by platform key (`os-arch`).
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformArtifact>,
    /// Parsed manifest.
    #[serde(default)]
    pub manifest: Option<TemplateManifest>,
    /// Harvested sibling files.
    #[serde(default)]
    pub files: HarvestedFiles,
}

impl TemplateMetadata {
    /// Start a record for `candidate` with no platforms or files yet.
    #[must_use]
    pub fn from_candidate(candidate: &TemplateCandidate) -> Self {
        Self {
            name: candidate.name.clone(),
            repo: candidate.repo.clone(),
            owner: candidate.owner.clone(),
            version: candidate.version.clone(),
            tag: candidate.tag.clone(),
            published_at: candidate.published_at.clone(),
            html_url: candidate.html_url.clone(),
            provenance: candidate.provenance.clone(),
            verified: false,
            platforms: BTreeMap::new(),
            manifest: None,
            files: HarvestedFiles::default(),
        }
    }

    /// Record a platform artifact, replacing any previous one.
    pub fn add_platform(&mut self, artifact: PlatformArtifact) {
        self.platforms.insert(artifact.platform().key(), artifact);
    }
}

/// Errors reading or writing metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `meta.json` is not a valid record.
    #[error("invalid metadata {}: {source}", path.display())]
    Invalid {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads and writes template directories under an output root.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `name`. Safe because template names cannot contain
    /// separators or dots.
    #[must_use]
    pub fn template_dir(&self, name: &TemplateName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Create the directory of `name` if needed and return it.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] if the directory cannot be created.
    pub fn ensure_dir(&self, name: &TemplateName) -> Result<PathBuf, MetadataError> {
        let dir = self.template_dir(name);
        fs::create_dir_all(&dir).map_err(|source| MetadataError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Write a harvested file into the directory of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] on write failure.
    pub fn write_file(
        &self,
        name: &TemplateName,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, MetadataError> {
        let path = self.ensure_dir(name)?.join(filename);
        fs::write(&path, bytes).map_err(|source| MetadataError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Write the record and its `manifest.json` sibling.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] on write failure.
    pub fn save(&self, meta: &TemplateMetadata) -> Result<PathBuf, MetadataError> {
        let encode = |value: serde_json::Result<String>, path: PathBuf| {
            value.map_err(|source| MetadataError::Invalid { path, source })
        };
        let dir = self.ensure_dir(&meta.name)?;
        if let Some(manifest) = &meta.manifest {
            let json = encode(
                serde_json::to_string_pretty(manifest),
                dir.join(MANIFEST_FILE),
            )?;
            self.write_file(&meta.name, MANIFEST_FILE, json.as_bytes())?;
        }
        let json = encode(serde_json::to_string_pretty(meta), dir.join(META_FILE))?;
        self.write_file(&meta.name, META_FILE, json.as_bytes())
    }

    /// Load the record of `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error when `meta.json` exists but cannot be read or parsed.
    pub fn load(&self, name: &TemplateName) -> Result<Option<TemplateMetadata>, MetadataError> {
        let path = self.template_dir(name).join(META_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(MetadataError::Io { path, source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| MetadataError::Invalid { path, source })
    }

    /// Load every record under the root, in name order.
    ///
    /// Directories whose names are not template names, or that have no
    /// `meta.json`, are skipped. Unparseable records are skipped with a
    /// warning so one bad directory cannot block the index.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] if the root cannot be listed.
    pub fn load_all(&self) -> Result<Vec<TemplateMetadata>, MetadataError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(MetadataError::Io {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut names: Vec<TemplateName> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .filter_map(|name| TemplateName::try_from(name).ok())
            .collect();
        names.sort();

        let mut records = Vec::new();
        for name in names {
            match self.load(&name) {
                Ok(Some(meta)) if meta.name == name => records.push(meta),
                Ok(Some(meta)) => log::warn!(
                    "skipping {}: record names a different template ({})",
                    name,
                    meta.name
                ),
                Ok(None) => {}
                Err(e) => log::warn!("skipping {name}: {e}"),
            }
        }
        Ok(records)
    }

    /// Compiled preview files of `name`, in page order.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] if the directory exists but cannot be
    /// listed.
    pub fn previews(&self, name: &TemplateName) -> Result<Vec<String>, MetadataError> {
        let dir = self.template_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(MetadataError::Io { path: dir, source }),
        };
        let mut pages: Vec<(u32, String)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .filter_map(|file| preview_page(&file).map(|page| (page, file)))
            .collect();
        pages.sort();
        Ok(pages.into_iter().map(|(_, file)| file).collect())
    }
}

/// Page number of a `preview-<n>.svg` filename.
fn preview_page(filename: &str) -> Option<u32> {
    filename
        .strip_prefix(PREVIEW_PREFIX)?
        .strip_suffix(".svg")?
        .parse()
        .ok()
}
