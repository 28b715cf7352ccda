//! Mirror of the per-template output directories for the site deploy.

use crate::error::RegistryError;
use crate::metadata::MetadataStore;
use crate::template_name::TemplateName;
use std::fs;
use std::io;
use std::path::Path;

/// Replace `dest/<name>/` with a copy of each template's output directory.
///
/// Only regular files are copied; template directories are flat.
///
/// # Errors
///
/// Returns [`RegistryError::Deploy`] naming the path that could not be
/// written.
pub fn sync_templates(
    store: &MetadataStore,
    names: &[TemplateName],
    dest: &Path,
) -> Result<usize, RegistryError> {
    let mut copied = 0;
    for name in names {
        let source = store.template_dir(name);
        let target = dest.join(name.as_str());
        if target.exists() {
            fs::remove_dir_all(&target).map_err(deploy_error(&target))?;
        }
        fs::create_dir_all(&target).map_err(deploy_error(&target))?;
        for entry in fs::read_dir(&source).map_err(deploy_error(&source))? {
            let entry = entry.map_err(deploy_error(&source))?;
            let file_type = entry.file_type().map_err(deploy_error(&entry.path()))?;
            if !file_type.is_file() {
                continue;
            }
            let to = target.join(entry.file_name());
            fs::copy(entry.path(), &to).map_err(deploy_error(&to))?;
        }
        copied += 1;
    }
    log::info!("synced {copied} template(s) to {}", dest.display());
    Ok(copied)
}

fn deploy_error(path: &Path) -> impl FnOnce(io::Error) -> RegistryError + use<> {
    let owned = path.to_path_buf();
    move |source| RegistryError::Deploy {
        path: owned,
        source,
    }
}
