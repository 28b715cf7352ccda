//! Candidate discovery.
//!
//! Enumerates templates from three sources, in precedence order: the
//! official repository's latest release, configured verified sources, and
//! community repositories tagged with the discovery topic. A template is a
//! candidate when its version differs from the one recorded in the registry
//! (or when forced). Failures fetching one repository never stop discovery
//! of the others.

use crate::asset_name::{AssetNaming, checksum_asset};
use crate::candidate::{Provenance, TemplateCandidate};
use crate::config::VerifiedSource;
use crate::registry::{Registry, Trust};
use crate::source::{Asset, Release, SourceProvider};
use crate::template_name::TemplateName;
use std::collections::BTreeSet;

/// Inputs to discovery beyond the provider and prior registry.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Official repository, `owner/name`.
    pub official_repo: String,
    /// Community topic.
    pub topic: String,
    /// Asset naming convention.
    pub naming: AssetNaming,
    /// Configured verified sources.
    pub verified: Vec<VerifiedSource>,
    /// Ignore recorded versions.
    pub force: bool,
}

/// Enumerate candidates and filter them against `registry`.
#[must_use]
pub fn discover(
    provider: &dyn SourceProvider,
    settings: &DiscoverySettings,
    registry: &Registry,
) -> Vec<TemplateCandidate> {
    let mut all = official_candidates(provider, settings);
    all.extend(verified_candidates(&settings.verified));
    all.extend(community_candidates(provider, settings));

    let mut seen = BTreeSet::new();
    let mut selected = Vec::new();
    for candidate in all {
        if !seen.insert(candidate.name.clone()) {
            log::warn!(
                "ignoring {} from {}: name already provided by a higher-precedence source",
                candidate.name,
                candidate.repo
            );
            continue;
        }
        if candidate.provenance == Provenance::Community && is_official_name(&candidate, registry) {
            log::warn!(
                "ignoring {} from {}: the registry records it as an official template",
                candidate.name,
                candidate.repo
            );
            continue;
        }
        if is_current(&candidate, registry) && !settings.force {
            log::debug!("{} {} is up to date", candidate.name, candidate.version);
            continue;
        }
        log::info!(
            "candidate {} {} ({}, {})",
            candidate.name,
            candidate.version,
            candidate.provenance.label(),
            candidate.repo
        );
        selected.push(candidate);
    }
    log::info!("discovered {} candidate(s)", selected.len());
    selected
}

fn is_current(candidate: &TemplateCandidate, registry: &Registry) -> bool {
    registry.version_of(&candidate.name) == Some(candidate.version.as_str())
}

/// Official names stay official even when the official release could not be
/// fetched this run.
fn is_official_name(candidate: &TemplateCandidate, registry: &Registry) -> bool {
    registry
        .templates
        .iter()
        .any(|entry| entry.name == candidate.name && entry.trust == Trust::Official)
}

fn official_candidates(
    provider: &dyn SourceProvider,
    settings: &DiscoverySettings,
) -> Vec<TemplateCandidate> {
    let repo = settings.official_repo.as_str();
    let release = match provider.latest_release(repo) {
        Ok(release) => release,
        Err(e) => {
            log::warn!("skipping official repository {repo}: {e}");
            return Vec::new();
        }
    };
    let source = ReleaseSource {
        repo,
        owner: owner_of(repo),
        html_url: github_url(repo),
    };
    release_candidates(&source, &release, &settings.naming, |name| {
        (Provenance::Official, Some(format!("cmd/{name}/README.md")))
    })
}

fn community_candidates(
    provider: &dyn SourceProvider,
    settings: &DiscoverySettings,
) -> Vec<TemplateCandidate> {
    let repositories = match provider.search_repositories(&settings.topic) {
        Ok(repositories) => repositories,
        Err(e) => {
            log::warn!("community search for topic {} failed: {e}", settings.topic);
            return Vec::new();
        }
    };
    log::info!(
        "found {} repositories tagged {}",
        repositories.len(),
        settings.topic
    );

    let mut candidates = Vec::new();
    for repository in repositories {
        if repository
            .full_name
            .eq_ignore_ascii_case(&settings.official_repo)
        {
            continue;
        }
        let release = match provider.latest_release(&repository.full_name) {
            Ok(release) => release,
            Err(e) => {
                log::warn!("skipping {}: {e}", repository.full_name);
                continue;
            }
        };
        let source = ReleaseSource {
            repo: &repository.full_name,
            owner: &repository.owner.login,
            html_url: repository.html_url.clone(),
        };
        let found = release_candidates(&source, &release, &settings.naming, |_| {
            (Provenance::Community, None)
        });
        if found.is_empty() {
            log::debug!(
                "{} {} has no template assets",
                repository.full_name,
                release.tag_name
            );
        }
        candidates.extend(found);
    }
    candidates
}

fn verified_candidates(sources: &[VerifiedSource]) -> Vec<TemplateCandidate> {
    sources
        .iter()
        .filter_map(|source| match TemplateName::try_from(source.name.as_str()) {
            Ok(name) => Some(verified_candidate(name, source)),
            Err(e) => {
                log::warn!("ignoring verified source {}: {e}", source.repo);
                None
            }
        })
        .collect()
}

fn verified_candidate(name: TemplateName, source: &VerifiedSource) -> TemplateCandidate {
    TemplateCandidate {
        name,
        repo: source.repo.clone(),
        owner: owner_of(&source.repo).to_owned(),
        version: source
            .version
            .strip_prefix('v')
            .unwrap_or(&source.version)
            .to_owned(),
        tag: source.rev.clone(),
        published_at: None,
        assets: Vec::new(),
        html_url: github_url(&source.repo),
        provenance: Provenance::Verified {
            rev: source.rev.clone(),
            package: source.package.clone(),
            language: source.language.clone(),
        },
        readme_path: package_readme(&source.package),
    }
}

struct ReleaseSource<'a> {
    repo: &'a str,
    owner: &'a str,
    html_url: String,
}

/// One candidate per distinct template name in the release assets.
fn release_candidates(
    source: &ReleaseSource<'_>,
    release: &Release,
    naming: &AssetNaming,
    classify: impl Fn(&TemplateName) -> (Provenance, Option<String>),
) -> Vec<TemplateCandidate> {
    let checksum = checksum_asset(&release.assets);
    naming
        .index(&release.assets)
        .into_iter()
        .map(|(name, platforms)| {
            let mut assets: Vec<Asset> = platforms.into_values().cloned().collect();
            assets.extend(checksum.cloned());
            let (provenance, readme_path) = classify(&name);
            TemplateCandidate {
                name,
                repo: source.repo.to_owned(),
                owner: source.owner.to_owned(),
                version: release.version().to_owned(),
                tag: release.tag_name.clone(),
                published_at: release.published_at.clone(),
                assets,
                html_url: source.html_url.clone(),
                provenance,
                readme_path,
            }
        })
        .collect()
}

fn owner_of(repo: &str) -> &str {
    repo.split_once('/').map_or(repo, |(owner, _)| owner)
}

fn github_url(repo: &str) -> String {
    format!("https://github.com/{repo}")
}

/// README path inside a Go package directory such as `./cmd/demo`.
fn package_readme(package: &str) -> Option<String> {
    let dir = package.trim_start_matches("./").trim_matches('/');
    if dir.is_empty() || dir == "." {
        None
    } else {
        Some(format!("{dir}/README.md"))
    }
}
