//! Stage orchestration for a registry run.
//!
//! Each stage can run on its own (the candidate list and per-template
//! records persist in the output directory between invocations) or all
//! together through [`Pipeline::run`]. Within a stage templates are
//! processed one at a time and a failing template never stops the others.

use crate::asset_name::AssetNaming;
use crate::build::container::ContainerRuntime;
use crate::build::publish::Publisher;
use crate::build::{BuildOptions, BuildOutcome, BuildPipeline};
use crate::candidate::{TemplateCandidate, load_candidates, save_candidates};
use crate::command::CommandExecutor;
use crate::config::Config;
use crate::deploy::sync_templates;
use crate::discovery::{DiscoverySettings, discover};
use crate::error::{RegistryError, Result, TemplateError};
use crate::extract::{ExtractSettings, Extraction, Extractor};
use crate::metadata::MetadataStore;
use crate::platform::Platform;
use crate::preview::{PreviewCompiler, compile_previews};
use crate::registry::{Registry, RegistryEntry, merge};
use crate::sandbox::ExecutionSandbox;
use crate::source::SourceProvider;
use crate::summary::RunSummary;
use chrono::Utc;
use std::path::Path;

/// External collaborators of a run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// Release host.
    pub provider: &'a dyn SourceProvider,
    /// Runs untrusted template binaries.
    pub sandbox: &'a dyn ExecutionSandbox,
    /// Runs trusted host tools such as git.
    pub executor: &'a dyn CommandExecutor,
    /// Runs verified build containers.
    pub runtime: &'a dyn ContainerRuntime,
    /// Publishes verified builds.
    pub publisher: &'a dyn Publisher,
    /// Compiles previews.
    pub compiler: &'a dyn PreviewCompiler,
}

/// A configured run.
pub struct Pipeline<'a> {
    config: &'a Config,
    services: Services<'a>,
    store: MetadataStore,
    host: Platform,
}

impl<'a> Pipeline<'a> {
    /// Prepare a run on this machine.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedHost`] when this machine is not
    /// one of the build targets, since host binaries could not be run.
    pub fn new(config: &'a Config, services: Services<'a>) -> Result<Self> {
        let host = Platform::host().ok_or(RegistryError::UnsupportedHost {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        })?;
        Ok(Self::with_host(config, services, host))
    }

    /// Prepare a run that treats `host` as the executing platform.
    #[must_use]
    pub fn with_host(config: &'a Config, services: Services<'a>, host: Platform) -> Self {
        Self {
            config,
            services,
            store: MetadataStore::new(config.output_dir.as_std_path()),
            host,
        }
    }

    /// Per-template record store.
    #[must_use]
    pub const fn store(&self) -> &MetadataStore {
        &self.store
    }

    fn naming(&self) -> AssetNaming {
        AssetNaming::new(self.config.asset_prefix.clone())
    }

    fn registry_path(&self) -> &Path {
        self.config.registry_path.as_std_path()
    }

    /// Enumerate candidates against the stored registry and persist them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry is unreadable or the
    /// candidate list cannot be written.
    pub fn discover(&self) -> Result<Vec<TemplateCandidate>> {
        let registry = Registry::load(self.registry_path())?;
        self.discover_against(&registry)
    }

    fn discover_against(&self, registry: &Registry) -> Result<Vec<TemplateCandidate>> {
        let settings = DiscoverySettings {
            official_repo: self.config.official_repo.clone(),
            topic: self.config.topic.clone(),
            naming: self.naming(),
            verified: self.config.verified.clone(),
            force: self.config.force,
        };
        let candidates = discover(self.services.provider, &settings, registry);
        let path = save_candidates(self.config.output_dir.as_std_path(), &candidates)?;
        log::debug!("wrote {}", path.display());
        Ok(candidates)
    }

    /// Extract every official and community candidate in the stored list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Candidates`] when the list is missing.
    pub fn extract(&self) -> Result<RunSummary> {
        let candidates = load_candidates(self.config.output_dir.as_std_path())?;
        Ok(self.extract_candidates(&candidates))
    }

    fn extract_candidates(&self, candidates: &[TemplateCandidate]) -> RunSummary {
        let settings = ExtractSettings {
            naming: self.naming(),
            host: self.host,
            exec_timeout: self.config.exec_timeout(),
            max_binary_bytes: self.config.build.max_artifact_bytes,
            hero_templates: self.config.hero_templates.clone(),
        };
        let extractor = Extractor::new(
            self.services.provider,
            self.services.sandbox,
            &self.store,
            &settings,
        );
        let mut summary = RunSummary::default();
        for candidate in candidates.iter().filter(|c| !c.provenance.is_verified()) {
            log::info!("extracting {} {}", candidate.name, candidate.version);
            match extractor.extract(candidate) {
                Ok(Extraction::Harvested(_)) => summary.succeed(&candidate.name),
                Ok(Extraction::HostRejected { error, .. }) | Err(error) => {
                    summary.fail(&candidate.name, "extract", &error);
                }
            }
        }
        summary
    }

    /// Build every verified candidate in the stored list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Candidates`] when the list is missing.
    pub fn build(&self) -> Result<RunSummary> {
        let candidates = load_candidates(self.config.output_dir.as_std_path())?;
        Ok(self.build_candidates(&candidates))
    }

    fn build_candidates(&self, candidates: &[TemplateCandidate]) -> RunSummary {
        let mut summary = RunSummary::default();
        let verified = candidates.iter().filter(|c| c.provenance.is_verified());
        let Some(publish_repo) = self.config.publish_repo.clone() else {
            for candidate in verified {
                summary.skip(&candidate.name, "build", "publish_repo is not configured");
            }
            return summary;
        };

        let options = BuildOptions {
            settings: self.config.build.clone(),
            naming: self.naming(),
            host: self.host,
            publish_repo,
            exec_timeout: self.config.exec_timeout(),
            hero_templates: self.config.hero_templates.clone(),
        };
        let pipeline = BuildPipeline {
            executor: self.services.executor,
            runtime: self.services.runtime,
            publisher: self.services.publisher,
            sandbox: self.services.sandbox,
            store: &self.store,
            options: &options,
        };
        for candidate in verified {
            match pipeline.build(candidate) {
                Ok(BuildOutcome::Published(_)) => summary.succeed(&candidate.name),
                Ok(BuildOutcome::Skipped { reason }) => {
                    summary.skip(&candidate.name, "build", reason);
                }
                Err(e) => summary.fail(&candidate.name, "build", &e),
            }
        }
        summary
    }

    /// Compile previews for every record in the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Metadata`] when the output directory cannot
    /// be listed.
    pub fn compile(&self) -> Result<RunSummary> {
        let fonts = self.config.font_path.as_std_path();
        let font_path = if fonts.is_dir() {
            Some(fonts)
        } else {
            log::debug!("font directory {} not found; using system fonts", fonts.display());
            None
        };

        let mut summary = RunSummary::default();
        for meta in self.store.load_all()? {
            if meta.files.document.is_none() {
                summary.skip(&meta.name, "compile", "no document harvested");
                continue;
            }
            match compile_previews(self.services.compiler, &self.store, &meta, font_path) {
                Ok(pages) => {
                    log::info!("{}: {} preview page(s)", meta.name, pages.len());
                    summary.succeed(&meta.name);
                }
                Err(e) => summary.fail(&meta.name, "compile", &TemplateError::from(e)),
            }
        }
        Ok(summary)
    }

    /// Merge every record in the output directory into the registry, write
    /// it, and sync the deploy mirror.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be read or
    /// written, or the mirror cannot be synced.
    pub fn index(&self) -> Result<Registry> {
        let prior = Registry::load(self.registry_path())?;
        self.index_over(&prior)
    }

    fn index_over(&self, prior: &Registry) -> Result<Registry> {
        let records = self.store.load_all()?;
        let mut fresh = Vec::with_capacity(records.len());
        for meta in &records {
            let previews = self.store.previews(&meta.name)?;
            fresh.push(RegistryEntry::from_metadata(
                meta,
                previews,
                self.config.official_owner(),
            ));
        }
        let registry = merge(prior, &fresh, self.config.official_owner(), Utc::now());
        registry.save(self.registry_path())?;
        log::info!(
            "wrote {} with {} template(s)",
            self.registry_path().display(),
            registry.templates.len()
        );

        let names: Vec<_> = records.into_iter().map(|meta| meta.name).collect();
        sync_templates(&self.store, &names, self.config.templates_dir.as_std_path())?;
        Ok(registry)
    }

    /// Run every stage. The registry is read once before discovery and
    /// written once at the end.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for whole-run failures only; per-template
    /// failures are in the returned summary.
    pub fn run(&self, skip_compile: bool) -> Result<(RunSummary, Registry)> {
        let prior = Registry::load(self.registry_path())?;
        let candidates = self.discover_against(&prior)?;
        let mut summary = self.extract_candidates(&candidates);
        summary.absorb(self.build_candidates(&candidates));
        if !skip_compile {
            let compiled = self.compile()?;
            for skipped in compiled.skipped {
                summary.skipped.push(skipped);
            }
        }
        let registry = self.index_over(&prior)?;
        Ok((summary, registry))
    }
}
