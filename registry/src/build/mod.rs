//! Verified build pipeline.
//!
//! A verified source is built from a pinned revision instead of trusting a
//! published binary. Each template moves through the stages of
//! [`BuildStage`] in order and the first failure ends the build:
//!
//! 1. clone the pinned revision,
//! 2. stage it into a container volume,
//! 3. fetch modules (the only networked step),
//! 4. cross-compile the full platform matrix offline,
//! 5. hash the artifacts and self-check `SHA256SUMS`,
//! 6. publish a release downstream,
//! 7. harvest metadata from the fresh host binary.
//!
//! Volumes and the temporary checkout are removed on every path.

pub mod container;
pub mod git;
pub mod go;
pub mod publish;
pub mod volumes;

use crate::asset_name::{AssetNaming, CHECKSUM_ASSET};
use crate::candidate::{Provenance, TemplateCandidate};
use crate::checksum::{HashManifest, Sha256Digest, Verification, compute_sha256, verify_against};
use crate::command::CommandExecutor;
use crate::config::BuildSettings;
use crate::error::TemplateError;
use crate::extract::{
    Harvest, convert, make_executable, parse_manifest, store_harvest, write_hero_frames,
};
use crate::metadata::{
    EXAMPLE_FILE, MANIFEST_FILE, MetadataStore, PlatformArtifact, README_FILE, TemplateMetadata,
};
use crate::platform::{BUILD_MATRIX, Platform};
use crate::sandbox::{EXAMPLE_LIMIT, ExecRequest, ExecutionSandbox, MANIFEST_LIMIT};
use crate::template_name::TemplateName;
use container::ContainerRuntime;
use publish::{Publisher, ReleaseRequest, download_url, release_tag};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use volumes::BuildVolumes;

/// The only language the pipeline can build.
pub const SUPPORTED_LANGUAGE: &str = "go";

/// README read from a checkout is bounded like the example.
const README_LIMIT: usize = 1024 * 1024;

/// Stages of a verified build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    /// Pinned shallow clone.
    Clone,
    /// Copy the checkout into the source volume.
    Stage,
    /// Download modules with network access.
    FetchDependencies,
    /// Offline cross-compilation.
    Build,
    /// Artifact hashing and `SHA256SUMS`.
    Hash,
    /// Release creation downstream.
    Publish,
    /// Harvest from the fresh host binary.
    ExtractMetadata,
}

impl BuildStage {
    /// Stage name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Stage => "stage",
            Self::FetchDependencies => "fetch-dependencies",
            Self::Build => "build",
            Self::Hash => "hash",
            Self::Publish => "publish",
            Self::ExtractMetadata => "extract-metadata",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a build that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// Built, published and harvested.
    Published(Box<TemplateMetadata>),
    /// Not buildable by this pipeline.
    Skipped {
        /// Why the template was skipped.
        reason: String,
    },
}

/// Run-wide build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Container images, limits and timeouts.
    pub settings: BuildSettings,
    /// Artifact naming convention.
    pub naming: AssetNaming,
    /// Platform whose artifact is executed for metadata.
    pub host: Platform,
    /// Downstream repository receiving releases.
    pub publish_repo: String,
    /// Timeout per sandboxed invocation.
    pub exec_timeout: Duration,
    /// Templates that get hero frames.
    pub hero_templates: Vec<String>,
}

/// Services a verified build needs.
pub struct BuildPipeline<'a> {
    /// Runs git on the host.
    pub executor: &'a dyn CommandExecutor,
    /// Runs the build containers.
    pub runtime: &'a dyn ContainerRuntime,
    /// Publishes releases.
    pub publisher: &'a dyn Publisher,
    /// Runs the fresh host binary.
    pub sandbox: &'a dyn ExecutionSandbox,
    /// Where the record is written.
    pub store: &'a MetadataStore,
    /// Run-wide options.
    pub options: &'a BuildOptions,
}

/// A built artifact that survived the self-check.
struct Artifact {
    platform: Platform,
    filename: String,
    path: PathBuf,
    digest: Sha256Digest,
}

impl BuildPipeline<'_> {
    /// Build, publish and harvest one verified candidate.
    ///
    /// Candidates that are not verified sources, or whose language is not
    /// buildable, are skipped rather than failed.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] from the first failing stage.
    pub fn build(&self, candidate: &TemplateCandidate) -> Result<BuildOutcome, TemplateError> {
        let Provenance::Verified {
            rev,
            package,
            language,
        } = &candidate.provenance
        else {
            return Ok(BuildOutcome::Skipped {
                reason: "not a verified source".to_owned(),
            });
        };
        if language != SUPPORTED_LANGUAGE {
            log::warn!(
                "{}: {language} sources are not supported, skipping",
                candidate.name
            );
            return Ok(BuildOutcome::Skipped {
                reason: format!("unsupported language {language}"),
            });
        }

        let workspace = tempfile::tempdir()?;
        let checkout = workspace.path().join("src");
        let artifacts_dir = workspace.path().join("artifacts");
        fs::create_dir(&checkout)?;
        fs::create_dir(&artifacts_dir)?;

        enter(candidate, BuildStage::Clone);
        git::clone_pinned(
            self.executor,
            &format!("https://github.com/{}.git", candidate.repo),
            rev,
            &checkout,
        )?;

        self.compile_matrix(candidate, package, &checkout, &artifacts_dir)?;

        enter(candidate, BuildStage::Hash);
        let (artifacts, sums) = self.hash_artifacts(&candidate.name, &artifacts_dir)?;

        enter(candidate, BuildStage::Publish);
        let tag = release_tag(&candidate.name, &candidate.version);
        self.publish(candidate, &tag, &artifacts, &sums)?;

        enter(candidate, BuildStage::ExtractMetadata);
        let meta = self.extract_metadata(candidate, package, &checkout, &tag, &artifacts)?;
        Ok(BuildOutcome::Published(Box::new(meta)))
    }

    /// Stage, fetch and cross-compile, then copy artifacts to the host.
    fn compile_matrix(
        &self,
        candidate: &TemplateCandidate,
        package: &str,
        checkout: &Path,
        artifacts_dir: &Path,
    ) -> Result<(), TemplateError> {
        let settings = &self.options.settings;
        enter(candidate, BuildStage::Stage);
        let volumes = BuildVolumes::create(self.runtime, &candidate.name)?;
        self.runtime.run(&go::stage_source(settings, checkout, &volumes))?;

        enter(candidate, BuildStage::FetchDependencies);
        self.runtime.run(&go::fetch_dependencies(settings, &volumes))?;

        enter(candidate, BuildStage::Build);
        for platform in BUILD_MATRIX {
            let artifact = self.options.naming.filename(&candidate.name, platform);
            log::debug!("{}: building {artifact}", candidate.name);
            self.runtime.run(&go::build_target(
                settings, &volumes, package, platform, &artifact,
            ))?;
        }
        self.runtime
            .run(&go::copy_artifacts(settings, &volumes, artifacts_dir))?;
        Ok(())
    }

    /// Hash every expected artifact, write `SHA256SUMS`, then re-read it and
    /// verify each artifact against the parsed copy.
    ///
    /// A missing or oversized artifact fails the template. An artifact that
    /// fails the self-check is deleted and its platform dropped, unless it is
    /// the host platform.
    fn hash_artifacts(
        &self,
        name: &TemplateName,
        dir: &Path,
    ) -> Result<(Vec<Artifact>, PathBuf), TemplateError> {
        let limit = self.options.settings.max_artifact_bytes;
        let mut sums = HashManifest::new();
        let mut built = Vec::new();
        for platform in BUILD_MATRIX {
            let filename = self.options.naming.filename(name, platform);
            let path = dir.join(&filename);
            let size = fs::metadata(&path)
                .map_err(|e| TemplateError::Build {
                    stage: BuildStage::Build.as_str(),
                    reason: format!("missing artifact {filename}: {e}"),
                })?
                .len();
            if size > limit {
                remove_artifact(&path);
                return Err(TemplateError::SizeLimitExceeded {
                    what: filename,
                    limit,
                });
            }
            sums.insert(filename.clone(), compute_sha256(&path)?);
            built.push((platform, filename, path));
        }

        let sums_path = dir.join(CHECKSUM_ASSET);
        fs::write(&sums_path, sums.render())?;
        let reparsed = HashManifest::parse(&fs::read_to_string(&sums_path)?)?;

        let mut artifacts = Vec::new();
        for (platform, filename, path) in built {
            match verify_against(&path, Some(&reparsed), &filename)? {
                Verification::Match(digest) => artifacts.push(Artifact {
                    digest,
                    platform,
                    filename,
                    path,
                }),
                other => {
                    remove_artifact(&path);
                    if platform == self.options.host {
                        return Err(self_check_failure(filename, other));
                    }
                    log::warn!("dropping {filename}: {other}");
                }
            }
        }
        if artifacts.len() != reparsed.len() {
            let mut kept = HashManifest::new();
            for artifact in &artifacts {
                kept.insert(artifact.filename.clone(), artifact.digest.clone());
            }
            fs::write(&sums_path, kept.render())?;
        }
        Ok((artifacts, sums_path))
    }

    fn publish(
        &self,
        candidate: &TemplateCandidate,
        tag: &str,
        artifacts: &[Artifact],
        sums: &Path,
    ) -> Result<(), TemplateError> {
        let repo = &self.options.publish_repo;
        self.publisher.delete_release(repo, tag)?;
        let mut files: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        files.push(sums.to_path_buf());
        self.publisher.create_release(&ReleaseRequest {
            repo: repo.clone(),
            tag: tag.to_owned(),
            title: format!("{} {}", candidate.name, candidate.version),
            notes: format!(
                "Built from {} at {} in the verified pipeline.",
                candidate.repo, candidate.tag
            ),
            files,
        })?;
        Ok(())
    }

    fn extract_metadata(
        &self,
        candidate: &TemplateCandidate,
        package: &str,
        checkout: &Path,
        tag: &str,
        artifacts: &[Artifact],
    ) -> Result<TemplateMetadata, TemplateError> {
        let mut meta = TemplateMetadata::from_candidate(candidate);
        meta.tag = tag.to_owned();
        meta.verified = true;
        for artifact in artifacts {
            meta.add_platform(PlatformArtifact {
                os: artifact.platform.os,
                arch: artifact.platform.arch,
                url: download_url(&self.options.publish_repo, tag, &artifact.filename),
                sha256: artifact.digest.clone(),
                verified: true,
            });
        }

        let host = artifacts
            .iter()
            .find(|a| a.platform == self.options.host)
            .ok_or_else(|| TemplateError::MissingPlatform {
                platform: self.options.host.key(),
            })?;
        make_executable(&host.path)?;
        let timeout = self.options.exec_timeout;

        let manifest = match read_source_file(checkout, package, MANIFEST_FILE, MANIFEST_LIMIT)? {
            Some(bytes) => bytes,
            None => self.ask_binary(&host.path, "--manifest", MANIFEST_LIMIT)?,
        };
        let example = match read_source_file(checkout, package, EXAMPLE_FILE, EXAMPLE_LIMIT)? {
            Some(bytes) => bytes,
            None => self.ask_binary(&host.path, "--example", EXAMPLE_LIMIT)?,
        };
        let harvest = Harvest {
            manifest: parse_manifest(&manifest)?,
            document: convert(self.sandbox, &host.path, example.clone(), timeout)?,
            example,
        };
        let readme = read_source_file(checkout, package, README_FILE, README_LIMIT)?
            .map_or_else(
                || format!("# {}\n", candidate.name),
                |bytes| String::from_utf8_lossy(&bytes).into_owned(),
            );
        store_harvest(self.store, &mut meta, &harvest, &readme)?;

        if self
            .options
            .hero_templates
            .iter()
            .any(|t| t == candidate.name.as_str())
        {
            meta.files.hero_frames = write_hero_frames(
                self.sandbox,
                self.store,
                &host.path,
                &candidate.name,
                &harvest.example,
                timeout,
            );
        }
        self.store.save(&meta)?;
        Ok(meta)
    }

    fn ask_binary(&self, binary: &Path, flag: &str, limit: usize) -> Result<Vec<u8>, TemplateError> {
        let output = self.sandbox.run(
            &ExecRequest::new(binary, &[flag])
                .with_output_limit(limit)
                .with_timeout(self.options.exec_timeout),
        )?;
        Ok(output.stdout)
    }
}

/// Read `filename` from the package directory, falling back to the
/// repository root. Only regular files are read, and at most `limit` bytes.
///
/// # Errors
///
/// Returns [`TemplateError::SizeLimitExceeded`] for an oversized file and
/// [`TemplateError::Io`] when a present file cannot be read.
pub fn read_source_file(
    checkout: &Path,
    package: &str,
    filename: &str,
    limit: usize,
) -> Result<Option<Vec<u8>>, TemplateError> {
    let package_dir = package.trim_start_matches("./").trim_matches('/');
    let mut candidates = Vec::new();
    if !package_dir.is_empty() && package_dir != "." && !package_dir.split('/').any(|c| c == "..") {
        candidates.push(checkout.join(package_dir).join(filename));
    }
    candidates.push(checkout.join(filename));

    for path in candidates {
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let mut bytes = Vec::new();
        fs::File::open(&path)?
            .take(u64::try_from(limit).unwrap_or(u64::MAX) + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() > limit {
            return Err(TemplateError::SizeLimitExceeded {
                what: filename.to_owned(),
                limit: u64::try_from(limit).unwrap_or(u64::MAX),
            });
        }
        return Ok(Some(bytes));
    }
    Ok(None)
}

fn self_check_failure(filename: String, verification: Verification) -> TemplateError {
    match verification {
        Verification::Mismatch { expected, actual } => TemplateError::DigestMismatch {
            file: filename,
            expected,
            actual,
        },
        Verification::Match(_) | Verification::Unknown(_) => TemplateError::Build {
            stage: BuildStage::Hash.as_str(),
            reason: format!("{filename} missing from {CHECKSUM_ASSET}"),
        },
    }
}

fn enter(candidate: &TemplateCandidate, stage: BuildStage) {
    log::info!("{} {}: {stage}", candidate.name, candidate.version);
}

fn remove_artifact(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("failed to delete {}: {e}", path.display());
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
