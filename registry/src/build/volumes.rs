//! Per-template build volumes, removed when the guard drops.

use super::container::{ContainerError, ContainerRuntime};
use crate::template_name::TemplateName;

/// The three named volumes of one build: source, module cache, and output.
///
/// Volumes are namespaced by template name so concurrent builds of
/// different templates never share state. All volumes are removed on drop,
/// whether the build succeeded or not.
pub struct BuildVolumes<'a> {
    runtime: &'a dyn ContainerRuntime,
    prefix: String,
    src: String,
    deps: String,
    out: String,
    created: Vec<String>,
}

impl<'a> BuildVolumes<'a> {
    /// Create `presto-<name>-src`, `-deps` and `-out`.
    ///
    /// Stale volumes from an interrupted run are removed first.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError`] when a volume cannot be created; any
    /// volumes already created are removed.
    pub fn create(
        runtime: &'a dyn ContainerRuntime,
        name: &TemplateName,
    ) -> Result<Self, ContainerError> {
        let mut volumes = Self {
            runtime,
            prefix: format!("presto-{name}"),
            src: format!("presto-{name}-src"),
            deps: format!("presto-{name}-deps"),
            out: format!("presto-{name}-out"),
            created: Vec::new(),
        };
        for volume in [volumes.src.clone(), volumes.deps.clone(), volumes.out.clone()] {
            if let Err(e) = runtime.remove_volume(&volume) {
                log::debug!("no stale volume {volume}: {e}");
            }
            runtime.create_volume(&volume)?;
            volumes.created.push(volume);
        }
        Ok(volumes)
    }

    /// Name for the container running `step` of this build.
    #[must_use]
    pub fn container(&self, step: &str) -> String {
        format!("{}-{step}", self.prefix)
    }

    /// Source volume name.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Module cache volume name.
    #[must_use]
    pub fn deps(&self) -> &str {
        &self.deps
    }

    /// Artifact volume name.
    #[must_use]
    pub fn out(&self) -> &str {
        &self.out
    }
}

impl Drop for BuildVolumes<'_> {
    fn drop(&mut self) {
        for volume in self.created.drain(..) {
            if let Err(e) = self.runtime.remove_volume(&volume) {
                log::warn!("failed to remove volume {volume}: {e}");
            }
        }
    }
}
