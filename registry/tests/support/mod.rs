//! Shared helpers for the registry behaviour tests.

use camino::Utf8PathBuf;
use presto_registry::config::Config;
use presto_registry::platform::{Arch, Os, Platform};
use presto_registry::registry::{Registry, RegistryEntry};
use std::path::Path;

/// Platform the pipeline treats as the executing host in tests.
pub fn test_host() -> Platform {
    Platform::new(Os::Linux, Arch::Amd64)
}

/// Configuration rooted in `dir`, with defaults elsewhere.
pub fn config_in(dir: &Path) -> Config {
    let root = Utf8PathBuf::from_path_buf(dir.to_path_buf()).expect("temp dir path not UTF-8");
    Config {
        output_dir: root.join("output"),
        registry_path: root.join("registry.json"),
        templates_dir: root.join("templates"),
        font_path: root.join("fonts"),
        hero_templates: Vec::new(),
        ..Config::default()
    }
}

/// Entry named `name` in `registry`.
pub fn entry<'a>(registry: &'a Registry, name: &str) -> Option<&'a RegistryEntry> {
    registry
        .templates
        .iter()
        .find(|entry| entry.name.as_str() == name)
}
