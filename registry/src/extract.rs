//! Untrusted extraction for official and community templates.
//!
//! Every platform binary of a release is downloaded and checked against the
//! release's `SHA256SUMS`. A mismatching binary is deleted and its platform
//! dropped; a binary with no published digest is kept but marked
//! unverified. The host platform's binary is then run in the sandbox to
//! harvest the manifest, the example, and the converted document.
//! Binaries never leave the temporary download directory.

use crate::asset_name::{AssetNaming, CHECKSUM_ASSET, checksum_asset};
use crate::candidate::TemplateCandidate;
use crate::checksum::{HashManifest, Verification, verify_against};
use crate::error::TemplateError;
use crate::hero::{FRAME_PREFIX, frame_filename, hero_frames};
use crate::manifest::TemplateManifest;
use crate::metadata::{
    DOCUMENT_FILE, EXAMPLE_FILE, MetadataStore, PlatformArtifact, README_FILE, TemplateMetadata,
};
use crate::platform::Platform;
use crate::sandbox::{
    DOCUMENT_LIMIT, EXAMPLE_LIMIT, ExecRequest, ExecutionSandbox, MANIFEST_LIMIT,
};
use crate::source::SourceProvider;
use crate::template_name::TemplateName;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest `SHA256SUMS` accepted.
const CHECKSUM_LIMIT: u64 = 1024 * 1024;

/// Settings shared by every extraction in a run.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Asset naming convention.
    pub naming: AssetNaming,
    /// Platform whose binary is executed.
    pub host: Platform,
    /// Wall-clock limit per sandboxed invocation.
    pub exec_timeout: Duration,
    /// Largest binary accepted.
    pub max_binary_bytes: u64,
    /// Templates that get hero frames.
    pub hero_templates: Vec<String>,
}

impl ExtractSettings {
    fn wants_hero(&self, name: &TemplateName) -> bool {
        self.hero_templates.iter().any(|t| t == name.as_str())
    }
}

/// Downloads, verifies and harvests templates.
pub struct Extractor<'a> {
    provider: &'a dyn SourceProvider,
    sandbox: &'a dyn ExecutionSandbox,
    store: &'a MetadataStore,
    settings: &'a ExtractSettings,
}

/// What the harvest produced from one binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    /// Parsed manifest.
    pub manifest: TemplateManifest,
    /// Example markdown bytes.
    pub example: Vec<u8>,
    /// Converted document bytes.
    pub document: Vec<u8>,
}

/// A downloaded binary that passed verification.
#[derive(Debug)]
pub struct VerifiedBinary {
    /// Its platform.
    pub platform: Platform,
    /// Where it was downloaded.
    pub path: PathBuf,
    /// The registry entry for it.
    pub artifact: PlatformArtifact,
}

/// Outcome of verifying every binary of one release.
#[derive(Debug, Default)]
pub struct VerifiedRelease {
    /// Binaries kept, verified or with no published digest.
    pub accepted: Vec<VerifiedBinary>,
    /// Platforms dropped, with the reason.
    pub rejected: Vec<(Platform, TemplateError)>,
}

/// What [`Extractor::extract`] stored.
#[derive(Debug)]
pub enum Extraction {
    /// Harvested from a verified host binary.
    Harvested(Box<TemplateMetadata>),
    /// The host binary was rejected. The record keeps the other platforms.
    HostRejected {
        /// The stored record.
        meta: Box<TemplateMetadata>,
        /// Why the host binary was rejected.
        error: TemplateError,
    },
}

impl<'a> Extractor<'a> {
    /// Create an extractor.
    #[must_use]
    pub fn new(
        provider: &'a dyn SourceProvider,
        sandbox: &'a dyn ExecutionSandbox,
        store: &'a MetadataStore,
        settings: &'a ExtractSettings,
    ) -> Self {
        Self {
            provider,
            sandbox,
            store,
            settings,
        }
    }

    /// Process one release-based candidate end to end and persist its record.
    ///
    /// When the host binary fails verification but other platforms pass,
    /// the record is still written with those platforms and the harvest of
    /// the previous record, if any, and [`Extraction::HostRejected`] carries
    /// the host failure.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when no platform survives verification,
    /// when the host binary is missing, when a sandboxed step fails, or when
    /// the record cannot be written.
    pub fn extract(&self, candidate: &TemplateCandidate) -> Result<Extraction, TemplateError> {
        let downloads = tempfile::tempdir()?;
        let mut release = self.verify_release(candidate, downloads.path());

        let mut meta = TemplateMetadata::from_candidate(candidate);
        let mut host_binary = None;
        for binary in release.accepted {
            if binary.platform == self.settings.host {
                host_binary = Some(binary.path);
            }
            meta.add_platform(binary.artifact);
        }
        let host_rejected = release
            .rejected
            .iter()
            .position(|(platform, _)| *platform == self.settings.host);
        let host_failure = host_rejected.map(|i| release.rejected.swap_remove(i).1);

        let binary = match (host_binary, host_failure) {
            (Some(binary), _) => binary,
            (None, Some(failure)) if !meta.platforms.is_empty() => {
                log::warn!(
                    "{}: host binary rejected; keeping {} other platform(s)",
                    candidate.name,
                    meta.platforms.len()
                );
                let kept = self.keep_prior_harvest(meta)?;
                return Ok(Extraction::HostRejected {
                    meta: Box::new(kept),
                    error: failure,
                });
            }
            (None, Some(failure)) => return Err(failure),
            (None, None) => {
                return Err(TemplateError::MissingPlatform {
                    platform: self.settings.host.key(),
                });
            }
        };
        make_executable(&binary)?;

        let harvest = harvest(self.sandbox, &binary, self.settings.exec_timeout)?;
        let readme = fetch_readme(self.provider, candidate);
        store_harvest(self.store, &mut meta, &harvest, &readme)?;
        if self.settings.wants_hero(&candidate.name) {
            meta.files.hero_frames = write_hero_frames(
                self.sandbox,
                self.store,
                &binary,
                &candidate.name,
                &harvest.example,
                self.settings.exec_timeout,
            );
        }
        self.store.save(&meta)?;
        Ok(Extraction::Harvested(Box::new(meta)))
    }

    /// Save `meta` with the manifest and files of the previous record.
    fn keep_prior_harvest(&self, mut meta: TemplateMetadata) -> Result<TemplateMetadata, TemplateError> {
        if let Some(prior) = self.store.load(&meta.name)? {
            meta.manifest = prior.manifest;
            meta.files = prior.files;
        }
        self.store.save(&meta)?;
        Ok(meta)
    }

    /// Download every platform binary of `candidate` into `dir` and verify
    /// each against the release's `SHA256SUMS`.
    ///
    /// Rejected binaries are deleted from `dir`.
    #[must_use]
    pub fn verify_release(&self, candidate: &TemplateCandidate, dir: &Path) -> VerifiedRelease {
        let checksums = self.fetch_checksums(candidate, dir);
        let mut release = VerifiedRelease::default();
        let index = self.settings.naming.index(&candidate.assets);
        let platforms = index.get(&candidate.name).cloned().unwrap_or_default();
        for (platform, asset) in platforms {
            let url = &asset.browser_download_url;
            match self.fetch_binary(&asset.name, url, dir, checksums.as_ref()) {
                Ok((path, verification)) => {
                    log::info!("{} {platform}: {verification}", candidate.name);
                    release.accepted.push(VerifiedBinary {
                        platform,
                        path,
                        artifact: PlatformArtifact {
                            os: platform.os,
                            arch: platform.arch,
                            url: url.clone(),
                            sha256: verification.actual().clone(),
                            verified: verification.is_match(),
                        },
                    });
                }
                Err(e) => {
                    log::warn!("{} {platform}: dropped: {e}", candidate.name);
                    release.rejected.push((platform, e));
                }
            }
        }
        release
    }

    /// Download and parse the release's checksum list.
    ///
    /// Any failure here leaves every platform unverifiable rather than
    /// failing the template.
    fn fetch_checksums(&self, candidate: &TemplateCandidate, dir: &Path) -> Option<HashManifest> {
        let Some(asset) = checksum_asset(&candidate.assets) else {
            log::warn!("{}: release has no {CHECKSUM_ASSET}", candidate.name);
            return None;
        };
        let path = dir.join(CHECKSUM_ASSET);
        let parsed = self
            .provider
            .download(&asset.browser_download_url, &path, CHECKSUM_LIMIT)
            .map_err(|e| e.to_string())
            .and_then(|_| fs::read_to_string(&path).map_err(|e| e.to_string()))
            .and_then(|text| HashManifest::parse(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                log::warn!("{}: ignoring unusable {CHECKSUM_ASSET}: {e}", candidate.name);
                None
            }
        }
    }

    /// Download one binary and verify it; mismatches are deleted.
    fn fetch_binary(
        &self,
        filename: &str,
        url: &str,
        dir: &Path,
        checksums: Option<&HashManifest>,
    ) -> Result<(PathBuf, Verification), TemplateError> {
        let path = dir.join(filename);
        self.provider.download(url, &path, self.settings.max_binary_bytes)?;
        let verification = verify_against(&path, checksums, filename)?;
        if let Verification::Mismatch { expected, actual } = verification {
            remove_quietly(&path);
            return Err(TemplateError::DigestMismatch {
                file: filename.to_owned(),
                expected,
                actual,
            });
        }
        Ok((path, verification))
    }
}

/// Write the harvested files and README next to the record and point the
/// record at them.
///
/// # Errors
///
/// Returns [`TemplateError::Metadata`] when a file cannot be written.
pub fn store_harvest(
    store: &MetadataStore,
    meta: &mut TemplateMetadata,
    harvest: &Harvest,
    readme: &str,
) -> Result<(), TemplateError> {
    store.write_file(&meta.name, EXAMPLE_FILE, &harvest.example)?;
    store.write_file(&meta.name, DOCUMENT_FILE, &harvest.document)?;
    store.write_file(&meta.name, README_FILE, readme.as_bytes())?;
    meta.manifest = Some(harvest.manifest.clone());
    meta.files.example = Some(EXAMPLE_FILE.to_owned());
    meta.files.document = Some(DOCUMENT_FILE.to_owned());
    meta.files.readme = Some(README_FILE.to_owned());
    Ok(())
}

/// Run `binary` three times in the sandbox: `--manifest`, `--example`, then
/// with the example on stdin to produce the document.
///
/// # Errors
///
/// Returns [`TemplateError`] when any invocation fails or the manifest is not
/// a JSON object.
pub fn harvest(
    sandbox: &dyn ExecutionSandbox,
    binary: &Path,
    timeout: Duration,
) -> Result<Harvest, TemplateError> {
    let manifest_bytes = sandbox
        .run(
            &ExecRequest::new(binary, &["--manifest"])
                .with_output_limit(MANIFEST_LIMIT)
                .with_timeout(timeout),
        )?
        .stdout;
    let manifest = parse_manifest(&manifest_bytes)?;

    let example = sandbox
        .run(
            &ExecRequest::new(binary, &["--example"])
                .with_output_limit(EXAMPLE_LIMIT)
                .with_timeout(timeout),
        )?
        .stdout;
    let document = convert(sandbox, binary, example.clone(), timeout)?;
    Ok(Harvest {
        manifest,
        example,
        document,
    })
}

/// Convert markdown to a document by piping it through `binary`.
///
/// # Errors
///
/// Returns [`TemplateError`] when the invocation fails.
pub fn convert(
    sandbox: &dyn ExecutionSandbox,
    binary: &Path,
    markdown: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>, TemplateError> {
    let output = sandbox.run(
        &ExecRequest::new(binary, &[])
            .with_stdin(markdown)
            .with_output_limit(DOCUMENT_LIMIT)
            .with_timeout(timeout),
    )?;
    Ok(output.stdout)
}

/// Parse manifest bytes into a [`TemplateManifest`].
///
/// # Errors
///
/// Returns [`TemplateError::Validation`] when the bytes are not a manifest
/// object.
pub fn parse_manifest(bytes: &[u8]) -> Result<TemplateManifest, TemplateError> {
    TemplateManifest::from_json(bytes).map_err(|e| TemplateError::Validation {
        reason: format!("manifest is not a valid JSON object: {e}"),
    })
}

/// Convert each hero frame and write `hero-frame-<i>.typ` files.
///
/// Frames left by an earlier version, and their compiled `.svg`, are
/// removed first. Frame failures are logged and skipped; they never fail
/// the template. Returns the filenames written, in frame order.
pub fn write_hero_frames(
    sandbox: &dyn ExecutionSandbox,
    store: &MetadataStore,
    binary: &Path,
    name: &TemplateName,
    example: &[u8],
    timeout: Duration,
) -> Vec<String> {
    let Ok(markdown) = std::str::from_utf8(example) else {
        log::warn!("{name}: example is not UTF-8; skipping hero frames");
        return Vec::new();
    };
    if let Err(e) = remove_stale_frames(&store.template_dir(name)) {
        log::warn!("{name}: could not clear old hero frames: {e}");
    }
    let mut written = Vec::new();
    for (index, frame) in hero_frames(markdown).into_iter().enumerate() {
        let filename = frame_filename(index, "typ");
        let result = convert(sandbox, binary, frame.into_bytes(), timeout)
            .and_then(|document| {
                store
                    .write_file(name, &filename, &document)
                    .map_err(TemplateError::from)
            });
        match result {
            Ok(_) => written.push(filename),
            Err(e) => log::warn!("{name}: {filename} failed: {e}"),
        }
    }
    written
}

fn remove_stale_frames(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        let stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FRAME_PREFIX));
        if stale {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Fetch the template README with fallbacks.
///
/// Tries the candidate's own README path, then the repository README, and
/// finally produces a `# <name>` placeholder.
#[must_use]
pub fn fetch_readme(provider: &dyn SourceProvider, candidate: &TemplateCandidate) -> String {
    if let Some(path) = &candidate.readme_path {
        match provider.file_contents(&candidate.repo, path) {
            Ok(text) => return text,
            Err(e) => log::debug!("{}: {path} unavailable: {e}", candidate.name),
        }
    }
    match provider.readme(&candidate.repo) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("{}: no README available: {e}", candidate.name);
            format!("# {}\n", candidate.name)
        }
    }
}

/// Mark a downloaded binary executable by its owner only.
///
/// Files whose owner execute bit is already set are left untouched.
///
/// # Errors
///
/// Returns the I/O error from reading or updating permissions.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    if perms.mode() & 0o100 != 0 {
        return Ok(());
    }
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)
}

/// Mark a downloaded binary executable (no-op off Unix).
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub const fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("failed to delete {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Provenance;
    use crate::sandbox::ExecOutput;
    use crate::checksum::sha256_bytes;
    use crate::platform::{Arch, Os};
    use crate::source::{Asset, FetchError, MockSourceProvider};
    use crate::test_utils::{FakeProvider, ScriptedSandbox, SandboxReply};

    fn candidate() -> TemplateCandidate {
        TemplateCandidate {
            name: TemplateName::try_from("demo").expect("valid"),
            repo: "alice/demo".to_owned(),
            owner: "alice".to_owned(),
            version: "1.0.0".to_owned(),
            tag: "v1.0.0".to_owned(),
            published_at: None,
            assets: Vec::new(),
            html_url: "https://github.com/alice/demo".to_owned(),
            provenance: Provenance::Community,
            readme_path: Some("docs/README.md".to_owned()),
        }
    }

    fn release_asset(file: &str) -> Asset {
        Asset {
            name: file.to_owned(),
            browser_download_url: format!("https://downloads.example.test/{file}"),
        }
    }

    #[test]
    fn rejected_host_keeps_other_platforms_and_the_prior_harvest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = MetadataStore::new(dir.path());
        let mut prior = TemplateMetadata::from_candidate(&TemplateCandidate {
            version: "0.9.0".to_owned(),
            ..candidate()
        });
        prior.manifest =
            Some(parse_manifest(br#"{"name":"demo","displayName":"Demo"}"#).expect("manifest"));
        prior.files.document = Some(DOCUMENT_FILE.to_owned());
        store.save(&prior).expect("save prior record");

        let naming = AssetNaming::default();
        let name = candidate().name;
        let host = Platform::new(Os::Linux, Arch::Amd64);
        let linux = naming.filename(&name, host);
        let darwin = naming.filename(&name, Platform::new(Os::Darwin, Arch::Arm64));
        let sums = format!(
            "{}  {linux}\n{}  {darwin}\n",
            sha256_bytes(b"what was published"),
            sha256_bytes(b"darwin build"),
        );
        let provider = FakeProvider::default()
            .with_blob(&release_asset(&linux).browser_download_url, b"tampered".to_vec())
            .with_blob(&release_asset(&darwin).browser_download_url, b"darwin build".to_vec())
            .with_blob(&release_asset(CHECKSUM_ASSET).browser_download_url, sums);
        let with_assets = TemplateCandidate {
            assets: vec![
                release_asset(&linux),
                release_asset(&darwin),
                release_asset(CHECKSUM_ASSET),
            ],
            ..candidate()
        };
        let settings = ExtractSettings {
            naming,
            host,
            exec_timeout: Duration::from_secs(1),
            max_binary_bytes: 1024,
            hero_templates: Vec::new(),
        };
        let sandbox = ScriptedSandbox::default();

        let outcome = Extractor::new(&provider, &sandbox, &store, &settings)
            .extract(&with_assets)
            .expect("record kept");

        let Extraction::HostRejected { meta, error } = outcome else {
            panic!("host binary should be rejected");
        };
        assert!(matches!(error, TemplateError::DigestMismatch { .. }), "{error}");
        let platforms: Vec<&str> = meta.platforms.keys().map(String::as_str).collect();
        assert_eq!(platforms, vec!["darwin-arm64"]);
        let stored = store.load(&name).expect("readable").expect("record written");
        assert_eq!(stored.version, "1.0.0");
        assert_eq!(
            stored.manifest.and_then(|m| m.display_name).as_deref(),
            Some("Demo")
        );
        assert_eq!(stored.files.document.as_deref(), Some(DOCUMENT_FILE));
    }

    #[test]
    fn readme_prefers_candidate_path() {
        let mut provider = MockSourceProvider::new();
        provider.expect_file_contents().times(1).returning(|repo, path| {
            assert_eq!((repo, path), ("alice/demo", "docs/README.md"));
            Ok("# Demo docs\n".to_owned())
        });
        provider.expect_readme().never();
        assert_eq!(fetch_readme(&provider, &candidate()), "# Demo docs\n");
    }

    #[test]
    fn readme_falls_back_to_root_then_placeholder() {
        let mut provider = MockSourceProvider::new();
        provider.expect_file_contents().returning(|_, path| {
            Err(FetchError::NotFound {
                url: path.to_owned(),
            })
        });
        provider.expect_readme().times(1).returning(|repo| {
            Err(FetchError::NotFound {
                url: repo.to_owned(),
            })
        });
        assert_eq!(fetch_readme(&provider, &candidate()), "# demo\n");
    }

    #[test]
    fn harvest_runs_manifest_example_then_conversion() {
        let sandbox = ScriptedSandbox::new(vec![
            SandboxReply::expect(&["--manifest"], None, Ok(stdout(br#"{"name":"demo"}"#))),
            SandboxReply::expect(&["--example"], None, Ok(stdout(b"# Hello\n"))),
            SandboxReply::expect(&[], Some(b"# Hello\n"), Ok(stdout(b"= Hello\n"))),
        ]);
        let harvest = harvest(&sandbox, Path::new("/bin/demo"), Duration::from_secs(1))
            .expect("harvest");
        assert_eq!(harvest.manifest.name.as_deref(), Some("demo"));
        assert_eq!(harvest.document, b"= Hello\n");
        sandbox.assert_finished();
    }

    #[test]
    fn malformed_manifest_is_a_validation_error() {
        let sandbox = ScriptedSandbox::new(vec![SandboxReply::expect(
            &["--manifest"],
            None,
            Ok(stdout(b"definitely not json")),
        )]);
        let err = harvest(&sandbox, Path::new("/bin/demo"), Duration::from_secs(1))
            .expect_err("must fail");
        assert!(matches!(err, TemplateError::Validation { .. }));
    }

    #[test]
    fn failed_hero_frames_are_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = MetadataStore::new(dir.path());
        let example = b"---\ntitle: t\n---\n# Title\n\nBody\n";
        let sandbox = ScriptedSandbox::new(vec![
            SandboxReply::any(Ok(stdout(b"frame0"))),
            SandboxReply::any(Err(crate::sandbox::SandboxError::Timeout {
                program: "demo".to_owned(),
                timeout: Duration::from_secs(1),
            })),
            SandboxReply::any(Ok(stdout(b"frame2"))),
            SandboxReply::any(Ok(stdout(b"frame3"))),
        ]);
        let name = TemplateName::try_from("gongwen").expect("valid");
        let written = write_hero_frames(
            &sandbox,
            &store,
            Path::new("/bin/gongwen"),
            &name,
            example,
            Duration::from_secs(1),
        );
        assert_eq!(
            written,
            vec!["hero-frame-0.typ", "hero-frame-2.typ", "hero-frame-3.typ"]
        );
        assert!(!store.template_dir(&name).join("hero-frame-1.typ").exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_artifacts_keep_their_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let built = dir.path().join("built");
        let downloaded = dir.path().join("downloaded");
        fs::write(&built, b"bin").expect("write built");
        fs::write(&downloaded, b"bin").expect("write downloaded");
        fs::set_permissions(&built, fs::Permissions::from_mode(0o750)).expect("chmod");
        fs::set_permissions(&downloaded, fs::Permissions::from_mode(0o644)).expect("chmod");

        make_executable(&built).expect("already executable");
        make_executable(&downloaded).expect("made executable");

        let mode = |path: &Path| fs::metadata(path).expect("stat").permissions().mode() & 0o777;
        assert_eq!(mode(&built), 0o750);
        assert_eq!(mode(&downloaded), 0o700);
    }

    #[test]
    fn frames_from_an_older_version_are_cleared() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = MetadataStore::new(dir.path());
        let name = TemplateName::try_from("gongwen").expect("valid");
        for old in ["hero-frame-0.typ", "hero-frame-0.svg", "hero-frame-5.typ", "hero-frame-5.svg"] {
            store.write_file(&name, old, b"old").expect("seed old frame");
        }
        store.write_file(&name, "example.md", b"kept").expect("seed example");
        let sandbox = ScriptedSandbox::new(vec![SandboxReply::any(Ok(stdout(b"new")))]);

        let written = write_hero_frames(
            &sandbox,
            &store,
            Path::new("/bin/gongwen"),
            &name,
            b"# Only\n",
            Duration::from_secs(1),
        );

        let template_dir = store.template_dir(&name);
        assert_eq!(written, vec!["hero-frame-0.typ"]);
        assert_eq!(
            fs::read(template_dir.join("hero-frame-0.typ")).expect("new frame"),
            b"new"
        );
        for gone in ["hero-frame-0.svg", "hero-frame-5.typ", "hero-frame-5.svg"] {
            assert!(!template_dir.join(gone).exists(), "{gone} survived");
        }
        assert!(template_dir.join("example.md").exists());
    }

    fn stdout(bytes: &[u8]) -> ExecOutput {
        ExecOutput {
            exit_code: 0,
            stdout: bytes.to_vec(),
            stderr: Vec::new(),
        }
    }
}
