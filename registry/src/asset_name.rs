//! Release asset naming: `<prefix>-<name>-<os>-<arch>[.exe]`.
//!
//! Parsing is the only way binaries are associated with templates and
//! platforms. Template names may themselves contain hyphens, so the parser
//! anchors on the architecture and OS vocabularies at the tail and treats the
//! remaining middle segment as the name.

use crate::platform::{Arch, Os, Platform};
use crate::source::Asset;
use crate::template_name::TemplateName;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Default prefix of template binaries.
pub const DEFAULT_PREFIX: &str = "presto-template";

/// Name of the checksum asset published next to the binaries.
pub const CHECKSUM_ASSET: &str = "SHA256SUMS";

/// The structured identity recovered from an asset filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAsset {
    /// Template the binary belongs to.
    pub template: TemplateName,
    /// Platform the binary targets.
    pub platform: Platform,
}

/// Asset naming convention with a configurable prefix.
///
/// # Examples
///
/// ```
/// use presto_registry::asset_name::AssetNaming;
/// use presto_registry::platform::{Arch, Os, Platform};
///
/// let naming = AssetNaming::default();
/// let parsed = naming
///     .parse("presto-template-jiaoan-shicao-windows-amd64.exe")
///     .expect("matches the convention");
/// assert_eq!(parsed.template.as_str(), "jiaoan-shicao");
/// assert_eq!(parsed.platform, Platform::new(Os::Windows, Arch::Amd64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNaming {
    prefix: String,
}

/// Assets of one release grouped by template, then by platform.
pub type AssetIndex<'a> = BTreeMap<TemplateName, BTreeMap<Platform, &'a Asset>>;

impl Default for AssetNaming {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl AssetNaming {
    /// Create a naming convention with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Return the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the filename for a template binary on `platform`.
    #[must_use]
    pub fn filename(&self, template: &TemplateName, platform: Platform) -> String {
        format!(
            "{}-{template}-{}-{}{}",
            self.prefix,
            platform.os,
            platform.arch,
            platform.os.exe_suffix()
        )
    }

    /// Parse an asset filename; `None` when it does not follow the convention.
    #[must_use]
    pub fn parse(&self, filename: &str) -> Option<ParsedAsset> {
        let rest = filename
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('-')?;
        let (stem, has_exe) = rest
            .strip_suffix(".exe")
            .map_or((rest, false), |bare| (bare, true));

        let (head, arch_key) = stem.rsplit_once('-')?;
        let arch: Arch = arch_key.parse().ok()?;
        let (name, os_key) = head.rsplit_once('-')?;
        let os: Os = os_key.parse().ok()?;

        // `.exe` is only meaningful for Windows binaries and required there.
        if has_exe != (os == Os::Windows) {
            return None;
        }

        let template = match TemplateName::try_from(name) {
            Ok(template) => template,
            Err(e) => {
                log::warn!("ignoring asset {filename}: {e}");
                return None;
            }
        };
        Some(ParsedAsset {
            template,
            platform: Platform::new(os, arch),
        })
    }

    /// Group release assets by template and platform.
    ///
    /// Assets not matching the convention are ignored. When two assets
    /// resolve to the same (template, platform) pair the first one wins.
    #[must_use]
    pub fn index<'a>(&self, assets: &'a [Asset]) -> AssetIndex<'a> {
        let mut index = AssetIndex::new();
        for asset in assets {
            let Some(parsed) = self.parse(&asset.name) else {
                continue;
            };
            let platforms = index.entry(parsed.template).or_default();
            match platforms.entry(parsed.platform) {
                Entry::Vacant(slot) => {
                    slot.insert(asset);
                }
                Entry::Occupied(existing) => {
                    log::debug!(
                        "ignoring duplicate asset {} (already have {})",
                        asset.name,
                        existing.get().name
                    );
                }
            }
        }
        index
    }

    /// Distinct template names embedded in the release assets, sorted.
    #[must_use]
    pub fn template_names(&self, assets: &[Asset]) -> Vec<TemplateName> {
        self.index(assets).into_keys().collect()
    }
}

/// Find the checksum asset of a release, if any.
#[must_use]
pub fn checksum_asset(assets: &[Asset]) -> Option<&Asset> {
    assets.iter().find(|asset| asset.name == CHECKSUM_ASSET)
}
