//! Behaviour-driven tests for release extraction.
//!
//! Template binaries are small shell scripts served by an in-memory release
//! host and run in the real process sandbox, so these scenarios are Unix
//! only.

#![cfg(unix)]

mod support;

use presto_registry::asset_name::{AssetNaming, CHECKSUM_ASSET};
use presto_registry::checksum::{HashManifest, sha256_bytes};
use presto_registry::config::Config;
use presto_registry::discovery::{DiscoverySettings, discover};
use presto_registry::error::TemplateError;
use presto_registry::extract::{ExtractSettings, Extractor, VerifiedRelease};
use presto_registry::metadata::{DOCUMENT_FILE, META_FILE, MetadataStore};
use presto_registry::pipeline::{Pipeline, Services};
use presto_registry::platform::{Arch, Os, Platform};
use presto_registry::registry::Registry;
use presto_registry::sandbox::{NetworkIsolation, ProcessSandbox};
use presto_registry::source::{Asset, Release};
use presto_registry::summary::RunSummary;
use presto_registry::test_utils::{
    FakeCompiler, FakeProvider, RecordingPublisher, RecordingRuntime, ScriptedSandbox,
    StubExecutor,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::time::Duration;
use tempfile::TempDir;

const OFFICIAL_REPO: &str = "Presto-io/Presto";
const PREFIX: &str = "tool";
const LINUX: &str = "tool-alpha-linux-amd64";
const DARWIN: &str = "tool-alpha-darwin-arm64";

/// A template binary: prints its manifest and example, and converts stdin.
const TEMPLATE_SCRIPT: &str = r#"#!/bin/sh
# PLATFORM
case "$1" in
  --manifest) echo '{"name":"alpha","displayName":"Alpha","category":"other"}' ;;
  --example) printf '# Alpha\n' ;;
  *) printf '= '; cat ;;
esac
"#;

fn template_binary(platform: &str) -> Vec<u8> {
    TEMPLATE_SCRIPT.replace("PLATFORM", platform).into_bytes()
}

fn download_url(file: &str) -> String {
    format!("https://downloads.example.test/v1.4.0/{file}")
}

/// Flip the first hex digit of a digest.
fn alter_one_character(digest: &str) -> String {
    let mut chars = digest.chars();
    let first = if chars.next() == Some('0') { '1' } else { '0' };
    std::iter::once(first).chain(chars).collect()
}

// ---------------------------------------------------------------------------
// Extraction world
// ---------------------------------------------------------------------------

struct ExtractionWorld {
    workspace: TempDir,
    downloads: TempDir,
    binaries: RefCell<Vec<(String, Vec<u8>)>>,
    checksums: RefCell<Option<String>>,
    verified: RefCell<Option<VerifiedRelease>>,
    outcome: RefCell<Option<(RunSummary, Registry)>>,
}

impl Default for ExtractionWorld {
    fn default() -> Self {
        Self {
            workspace: TempDir::new().expect("failed to create workspace"),
            downloads: TempDir::new().expect("failed to create download dir"),
            binaries: RefCell::new(Vec::new()),
            checksums: RefCell::new(None),
            verified: RefCell::new(None),
            outcome: RefCell::new(None),
        }
    }
}

impl ExtractionWorld {
    fn provider(&self) -> FakeProvider {
        let binaries = self.binaries.borrow();
        let checksums = self.checksums.borrow();
        let mut assets: Vec<Asset> = binaries
            .iter()
            .map(|(name, _)| Asset {
                name: name.clone(),
                browser_download_url: download_url(name),
            })
            .collect();
        if checksums.is_some() {
            assets.push(Asset {
                name: CHECKSUM_ASSET.to_owned(),
                browser_download_url: download_url(CHECKSUM_ASSET),
            });
        }
        let release = Release {
            tag_name: "v1.4.0".to_owned(),
            published_at: Some("2026-10-01T08:00:00Z".to_owned()),
            assets,
        };

        let mut provider = FakeProvider::default().with_release(OFFICIAL_REPO, release);
        for (name, bytes) in binaries.iter() {
            provider = provider.with_blob(&download_url(name), bytes.clone());
        }
        if let Some(text) = checksums.as_ref() {
            provider = provider.with_blob(&download_url(CHECKSUM_ASSET), text.clone());
        }
        provider
    }

    fn config(&self) -> Config {
        Config {
            asset_prefix: PREFIX.to_owned(),
            official_repo: OFFICIAL_REPO.to_owned(),
            ..support::config_in(self.workspace.path())
        }
    }

    fn digest_of(&self, file: &str) -> String {
        let binaries = self.binaries.borrow();
        let (_, bytes) = binaries
            .iter()
            .find(|(name, _)| name == file)
            .expect("binary not prepared");
        sha256_bytes(bytes).as_str().to_owned()
    }

    fn registry(&self) -> Registry {
        let outcome = self.outcome.borrow();
        let (_, registry) = outcome.as_ref().expect("run not completed");
        registry.clone()
    }
}

#[fixture]
fn extraction_world() -> ExtractionWorld {
    ExtractionWorld::default()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[given("an official release with linux-amd64 and darwin-arm64 binaries of alpha")]
fn given_official_release(extraction_world: &ExtractionWorld) {
    extraction_world.binaries.replace(vec![
        (LINUX.to_owned(), template_binary("linux-amd64")),
        (DARWIN.to_owned(), template_binary("darwin-arm64")),
    ]);
}

#[given("the checksum list matches both binaries")]
fn given_matching_checksums(extraction_world: &ExtractionWorld) {
    let mut sums = HashManifest::new();
    for (name, bytes) in extraction_world.binaries.borrow().iter() {
        sums.insert(name.clone(), sha256_bytes(bytes));
    }
    extraction_world.checksums.replace(Some(sums.render()));
}

#[given("the checksum entry for linux-amd64 is altered by one character")]
fn given_tampered_checksum(extraction_world: &ExtractionWorld) {
    let darwin = extraction_world.digest_of(DARWIN);
    let linux = alter_one_character(&extraction_world.digest_of(LINUX));
    extraction_world
        .checksums
        .replace(Some(format!("{darwin}  {DARWIN}\n{linux} *{LINUX}\n")));
}

#[when("the registry run completes")]
fn when_run_completes(extraction_world: &ExtractionWorld) {
    let provider = extraction_world.provider();
    let config = extraction_world.config();
    let sandbox = ProcessSandbox::with_isolation(NetworkIsolation::Host);
    let executor = StubExecutor::new(Vec::new());
    let runtime = RecordingRuntime::default();
    let publisher = RecordingPublisher::default();
    let compiler = FakeCompiler::default();
    let services = Services {
        provider: &provider,
        sandbox: &sandbox,
        executor: &executor,
        runtime: &runtime,
        publisher: &publisher,
        compiler: &compiler,
    };

    let pipeline = Pipeline::with_host(&config, services, support::test_host());
    let outcome = pipeline.run(false).expect("run should complete");
    extraction_world.outcome.replace(Some(outcome));
}

#[when("the release binaries are verified")]
fn when_release_verified(extraction_world: &ExtractionWorld) {
    let provider = extraction_world.provider();
    let config = extraction_world.config();
    let naming = AssetNaming::new(PREFIX);
    let discovery = DiscoverySettings {
        official_repo: config.official_repo.clone(),
        topic: config.topic.clone(),
        naming: naming.clone(),
        verified: Vec::new(),
        force: false,
    };
    let candidates = discover(&provider, &discovery, &Registry::default());
    let candidate = candidates.first().expect("alpha should be discovered");

    let settings = ExtractSettings {
        naming,
        host: support::test_host(),
        exec_timeout: Duration::from_secs(5),
        max_binary_bytes: 1024 * 1024,
        hero_templates: Vec::new(),
    };
    let store = MetadataStore::new(config.output_dir.as_std_path());
    let sandbox = ScriptedSandbox::default();
    let extractor = Extractor::new(&provider, &sandbox, &store, &settings);
    let release = extractor.verify_release(candidate, extraction_world.downloads.path());
    extraction_world.verified.replace(Some(release));
}

#[then("alpha is indexed with both platforms verified")]
fn then_both_verified(extraction_world: &ExtractionWorld) {
    let registry = extraction_world.registry();
    let alpha = support::entry(&registry, "alpha").expect("alpha should be indexed");
    assert_eq!(alpha.platforms.len(), 2);
    assert!(alpha.platforms.values().all(|artifact| artifact.verified));
    assert_eq!(alpha.display_name, "Alpha");
    assert_eq!(alpha.version, "1.4.0");
}

#[then("alpha is indexed with both platforms unverified")]
fn then_both_unverified(extraction_world: &ExtractionWorld) {
    let registry = extraction_world.registry();
    let alpha = support::entry(&registry, "alpha").expect("alpha should be indexed");
    assert_eq!(alpha.platforms.len(), 2);
    assert!(alpha.platforms.values().all(|artifact| !artifact.verified));
}

#[then("alpha has a harvested document")]
fn then_document_harvested(extraction_world: &ExtractionWorld) {
    let path = extraction_world
        .workspace
        .path()
        .join("output")
        .join("alpha")
        .join(DOCUMENT_FILE);
    let document = std::fs::read_to_string(&path).expect("document should be written");
    assert_eq!(document, "= # Alpha\n");
}

#[then("the deploy mirror holds alpha")]
fn then_mirror_holds_alpha(extraction_world: &ExtractionWorld) {
    let mirrored = extraction_world
        .workspace
        .path()
        .join("templates")
        .join("alpha")
        .join(META_FILE);
    assert!(mirrored.is_file(), "{} should exist", mirrored.display());
}

#[then("linux-amd64 is rejected with a digest mismatch")]
fn then_linux_rejected(extraction_world: &ExtractionWorld) {
    let verified = extraction_world.verified.borrow();
    let release = verified.as_ref().expect("release not verified");
    let linux = Platform::new(Os::Linux, Arch::Amd64);
    let rejection = release
        .rejected
        .iter()
        .find(|(platform, _)| *platform == linux)
        .map(|(_, error)| error);
    assert!(
        matches!(rejection, Some(TemplateError::DigestMismatch { file, .. }) if file == LINUX),
        "expected a digest mismatch for {LINUX}, got {rejection:?}"
    );
}

#[then("the linux-amd64 binary is not kept")]
fn then_linux_deleted(extraction_world: &ExtractionWorld) {
    assert!(!extraction_world.downloads.path().join(LINUX).exists());
}

#[then("darwin-arm64 is accepted as verified")]
fn then_darwin_accepted(extraction_world: &ExtractionWorld) {
    let verified = extraction_world.verified.borrow();
    let release = verified.as_ref().expect("release not verified");
    let darwin = Platform::new(Os::Darwin, Arch::Arm64);
    assert_eq!(release.accepted.len(), 1);
    let binary = release.accepted.first().expect("one accepted binary");
    assert_eq!(binary.platform, darwin);
    assert!(binary.artifact.verified);
    assert!(binary.path.exists());
}

#[then("alpha is indexed with darwin-arm64 only")]
fn then_alpha_on_darwin_only(extraction_world: &ExtractionWorld) {
    let registry = extraction_world.registry();
    let alpha = support::entry(&registry, "alpha").expect("alpha should be indexed");
    let platforms: Vec<&str> = alpha.platforms.keys().map(String::as_str).collect();
    assert_eq!(platforms, vec!["darwin-arm64"]);
    assert!(alpha.platforms.values().all(|artifact| artifact.verified));
    assert_eq!(alpha.version, "1.4.0");
}

#[then("the run summary skips alpha with a digest mismatch")]
fn then_summary_skips_alpha(extraction_world: &ExtractionWorld) {
    let outcome = extraction_world.outcome.borrow();
    let (summary, _) = outcome.as_ref().expect("run not completed");
    assert!(summary.succeeded.is_empty());
    assert!(
        summary
            .skipped
            .iter()
            .any(|skipped| skipped.name.as_str() == "alpha"
                && skipped.stage == "extract"
                && skipped.reason.contains("digest mismatch")),
        "unexpected summary: {summary}"
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/extraction.feature", index = 0)]
fn scenario_every_platform_verifies(extraction_world: ExtractionWorld) {
    let _ = extraction_world;
}

#[scenario(path = "tests/features/extraction.feature", index = 1)]
fn scenario_tampered_entry_drops_platform(extraction_world: ExtractionWorld) {
    let _ = extraction_world;
}

#[scenario(path = "tests/features/extraction.feature", index = 2)]
fn scenario_tampered_host_binary_keeps_other_platforms(extraction_world: ExtractionWorld) {
    let _ = extraction_world;
}

#[scenario(path = "tests/features/extraction.feature", index = 3)]
fn scenario_missing_checksums_are_unverified(extraction_world: ExtractionWorld) {
    let _ = extraction_world;
}
