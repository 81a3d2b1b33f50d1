use std::path::{Component, Path, PathBuf};

use declcfg_core::config::{InspectIndexRequest, CONFIGS_LOCATION_LABEL, UNPACK_TMP_DIR_PREFIX};
use declcfg_core::error::{CatalogError, Result};

use super::{as_pull_error, as_unpack_error, finish, ConfigEditor};
use crate::registry::ImageRegistry;

impl ConfigEditor {
    /// Extract the declarative configs stored in an index image into
    /// `request.output_dir`. Returns the output directory.
    pub async fn inspect_index(&self, request: &InspectIndexRequest) -> Result<PathBuf> {
        let mut registry = self.registries.create(&request.registry).await?;
        let result = self.extract_index(registry.as_mut(), request).await;
        finish(registry, result).await
    }

    async fn extract_index(
        &self,
        registry: &mut dyn ImageRegistry,
        request: &InspectIndexRequest,
    ) -> Result<PathBuf> {
        let image = request.image.as_str();

        registry
            .pull(image)
            .await
            .map_err(|e| as_pull_error(image, e))?;

        let labels = registry.labels(image).await?;
        let configs_location = labels
            .get(CONFIGS_LOCATION_LABEL)
            .ok_or_else(|| CatalogError::LabelMissingError {
                image: image.to_string(),
                label: CONFIGS_LOCATION_LABEL.to_string(),
            })?;

        let unpack_dir = self.temp_dir(UNPACK_TMP_DIR_PREFIX)?;
        registry
            .unpack(image, unpack_dir.path())
            .await
            .map_err(|e| as_unpack_error(image, e))?;

        let source = configs_source(unpack_dir.path(), configs_location).map_err(|message| {
            CatalogError::UnpackError {
                reference: image.to_string(),
                message,
            }
        })?;

        copy_dir_recursive(&source, &request.output_dir)
            .map_err(|e| CatalogError::write(&request.output_dir, e))?;

        tracing::info!(
            image = %image,
            output = %request.output_dir.display(),
            "Extracted index configs"
        );
        Ok(request.output_dir.clone())
    }
}

/// Resolve the configs label value to a directory inside `root`.
///
/// The value is a path from the image root; a leading `/` is ignored. It may
/// not step out of `root`, neither through `..` nor through symlinks.
fn configs_source(root: &Path, location: &str) -> std::result::Result<PathBuf, String> {
    let relative = Path::new(location.trim_start_matches('/'));
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!("configs location {} leaves the image root", location));
    }

    let not_found = || format!("configs directory {} not found in image", location);
    let root = root.canonicalize().map_err(|e| e.to_string())?;
    let source = root.join(relative).canonicalize().map_err(|_| not_found())?;
    if !source.starts_with(&root) {
        return Err(format!("configs location {} leaves the image root", location));
    }
    if !source.is_dir() {
        return Err(not_found());
    }
    Ok(source)
}

/// Copy `src` into `dst`, overwriting files that already exist.
///
/// Symlinks are recreated as links, never followed.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        remove_link(&dst_path)?;

        if file_type.is_symlink() {
            copy_link(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Remove `path` if it is a symlink, so writes never go through it.
fn remove_link(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => std::fs::remove_file(path),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> std::io::Result<()> {
    if dst.is_dir() {
        std::fs::remove_dir_all(dst)?;
    } else if dst.exists() {
        std::fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(std::fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_link(src: &Path, _dst: &Path) -> std::io::Result<()> {
    tracing::debug!(path = %src.display(), "Skipping symlink");
    Ok(())
}
