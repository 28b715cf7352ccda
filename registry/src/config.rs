//! Run configuration.
//!
//! Settings come from an optional TOML file (`presto-registry.toml` in the
//! working directory unless `--config` names another), layered over built-in
//! defaults. A few environment variables and CLI flags override the file.

use crate::sandbox::IsolationMode;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "presto-registry.toml";

/// Repository whose releases carry the official templates.
pub const DEFAULT_OFFICIAL_REPO: &str = "Presto-io/Presto";

/// Repository topic that marks community template repositories.
pub const DEFAULT_TOPIC: &str = "presto-template";

/// Errors loading configuration. All are fatal for a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config file path.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value `{key}`: {reason}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Container settings for the verified build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Go toolchain image used for dependency fetch and builds.
    pub go_image: String,
    /// Small image used to copy files in and out of volumes.
    pub helper_image: String,
    /// Memory limit passed to the container runtime.
    pub memory: String,
    /// CPU limit passed to the container runtime.
    pub cpus: String,
    /// Limit for the dependency fetch step.
    pub deps_timeout_secs: u64,
    /// Limit for each per-platform build.
    pub build_timeout_secs: u64,
    /// Limit for helper copy steps.
    pub copy_timeout_secs: u64,
    /// Largest artifact accepted.
    pub max_artifact_bytes: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            go_image: "golang:1.23-alpine".to_owned(),
            helper_image: "alpine:3.20".to_owned(),
            memory: "2g".to_owned(),
            cpus: "2".to_owned(),
            deps_timeout_secs: 600,
            build_timeout_secs: 600,
            copy_timeout_secs: 120,
            max_artifact_bytes: 50 * 1024 * 1024,
        }
    }
}

impl BuildSettings {
    /// Dependency fetch limit.
    #[must_use]
    pub const fn deps_timeout(&self) -> Duration {
        Duration::from_secs(self.deps_timeout_secs)
    }

    /// Per-platform build limit.
    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Helper copy limit.
    #[must_use]
    pub const fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }
}

/// A template built from pinned source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifiedSource {
    /// Template name.
    pub name: String,
    /// Source repository, `owner/name`.
    pub repo: String,
    /// Commit or tag to build.
    pub rev: String,
    /// Version to publish.
    pub version: String,
    /// Package path of the template's main package.
    #[serde(default = "default_package")]
    pub package: String,
    /// Source language.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_package() -> String {
    ".".to_owned()
}

fn default_language() -> String {
    "go".to_owned()
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Working directory for per-template records.
    pub output_dir: Utf8PathBuf,
    /// Published registry index.
    pub registry_path: Utf8PathBuf,
    /// Deploy mirror of the template directories.
    pub templates_dir: Utf8PathBuf,
    /// Official repository, `owner/name`.
    pub official_repo: String,
    /// Community discovery topic.
    pub topic: String,
    /// Binary asset prefix.
    pub asset_prefix: String,
    /// Repository that receives verified build releases.
    pub publish_repo: Option<String>,
    /// Wall-clock limit for each sandboxed invocation.
    pub exec_timeout_secs: u64,
    /// Network isolation of sandboxed binaries.
    pub network_isolation: IsolationMode,
    /// Templates that get hero frames.
    pub hero_templates: Vec<String>,
    /// Font directory for preview compilation.
    pub font_path: Utf8PathBuf,
    /// Reprocess every discovered template regardless of version.
    pub force: bool,
    /// Verified build settings.
    pub build: BuildSettings,
    /// Templates built from pinned source.
    pub verified: Vec<VerifiedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from("output"),
            registry_path: Utf8PathBuf::from("registry.json"),
            templates_dir: Utf8PathBuf::from("templates"),
            official_repo: DEFAULT_OFFICIAL_REPO.to_owned(),
            topic: DEFAULT_TOPIC.to_owned(),
            asset_prefix: crate::asset_name::DEFAULT_PREFIX.to_owned(),
            publish_repo: None,
            exec_timeout_secs: 30,
            network_isolation: IsolationMode::Auto,
            hero_templates: vec!["gongwen".to_owned()],
            font_path: Utf8PathBuf::from("fonts"),
            force: false,
            build: BuildSettings::default(),
            verified: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is used when present and defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let (file, required) = path.map_or_else(
            || (Utf8PathBuf::from(DEFAULT_CONFIG_FILE), false),
            |explicit| (explicit.to_owned(), true),
        );
        let text = match std::fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no {file}; using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path: file, source }),
        };
        let config = Self::parse(&text).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: file.clone(),
                source,
            },
            ParseFailure::Invalid(err) => err,
        })?;
        log::debug!("loaded configuration from {file}");
        Ok(config)
    }

    /// Parse and validate configuration text.
    fn parse(text: &str) -> Result<Self, ParseFailure> {
        let config: Self = toml::from_str(text).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// `FORCE_REBUILD` set to a truthy value (`1`, `true`, `yes`, `on`)
    /// enables forced reprocessing.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("FORCE_REBUILD").is_some_and(|value| is_truthy(&value)) {
            self.force = true;
        }
    }

    /// Check value ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exec_timeout_secs == 0 {
            return Err(invalid("exec_timeout_secs", "must be positive"));
        }
        if self.asset_prefix.trim().is_empty() {
            return Err(invalid("asset_prefix", "must not be empty"));
        }
        if !is_repo_slug(&self.official_repo) {
            return Err(invalid("official_repo", "expected `owner/name`"));
        }
        if let Some(repo) = &self.publish_repo
            && !is_repo_slug(repo)
        {
            return Err(invalid("publish_repo", "expected `owner/name`"));
        }
        if let Some(source) = self.verified.iter().find(|s| !is_repo_slug(&s.repo)) {
            return Err(invalid(
                "verified.repo",
                format!("expected `owner/name` for {}", source.name),
            ));
        }
        if self.build.max_artifact_bytes == 0 {
            return Err(invalid("build.max_artifact_bytes", "must be positive"));
        }
        Ok(())
    }

    /// Account that owns the official repository.
    #[must_use]
    pub fn official_owner(&self) -> &str {
        self.official_repo
            .split_once('/')
            .map_or(self.official_repo.as_str(), |(owner, _)| owner)
    }

    /// Sandbox wall-clock limit.
    #[must_use]
    pub const fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn is_repo_slug(value: &str) -> bool {
    value.split_once('/').is_some_and(|(owner, name)| {
        !owner.is_empty() && !name.is_empty() && !name.contains('/')
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").unwrap_or_else(|_| panic!("empty config parses"));
        assert_eq!(config, Config::default());
        assert_eq!(config.official_owner(), "Presto-io");
    }

    #[test]
    fn parses_nested_tables() {
        let text = r#"
            output_dir = "out"
            publish_repo = "Presto-io/verified-builds"
            network_isolation = "required"
            hero_templates = []

            [build]
            memory = "4g"

            [[verified]]
            name = "demo"
            repo = "someone/demo"
            rev = "0123abc"
            version = "1.2.0"
            package = "./cmd/demo"
        "#;
        let config = Config::parse(text).unwrap_or_else(|_| panic!("valid config"));
        assert_eq!(config.output_dir, "out");
        assert_eq!(config.network_isolation, IsolationMode::Required);
        assert!(config.hero_templates.is_empty());
        assert_eq!(config.build.memory, "4g");
        assert_eq!(config.build.cpus, "2");
        let source = config.verified.first().expect("one verified source");
        assert_eq!(source.language, "go");
        assert_eq!(source.package, "./cmd/demo");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::parse("outptu_dir = \"x\""),
            Err(ParseFailure::Toml(_))
        ));
    }

    #[rstest]
    #[case::zero_timeout("exec_timeout_secs = 0", "exec_timeout_secs")]
    #[case::bad_repo("official_repo = \"Presto\"", "official_repo")]
    #[case::bad_publish("publish_repo = \"a/b/c\"", "publish_repo")]
    fn out_of_range_values_are_rejected(#[case] text: &str, #[case] expected_key: &str) {
        match Config::parse(text) {
            Err(ParseFailure::Invalid(ConfigError::Invalid { key, .. })) => {
                assert_eq!(key, expected_key);
            }
            _ => panic!("expected validation failure for {text}"),
        }
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("YES", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("", false)]
    fn force_rebuild_env_is_boolish(#[case] value: &str, #[case] force: bool) {
        let mut config = Config::default();
        config.apply_env(|key| (key == "FORCE_REBUILD").then(|| value.to_owned()));
        assert_eq!(config.force, force);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Utf8Path::new("/nonexistent/presto-registry.toml")))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("custom.toml");
        std::fs::write(&file, "topic = \"custom-topic\"\n").expect("write");
        let path = Utf8PathBuf::from_path_buf(file).expect("utf-8 temp path");
        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.topic, "custom-topic");
    }
}
