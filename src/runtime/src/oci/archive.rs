//! Extraction of `docker save` / `podman save` archives.
//!
//! A saved archive is a tar holding a `manifest.json` whose first entry lists
//! the image layers bottom to top, relative to the archive root.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use declcfg_core::error::{CatalogError, Result};
use serde::Deserialize;
use tar::Archive;

use super::layers::extract_layers;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArchiveManifest {
    layers: Vec<String>,
}

/// Apply the layers of the saved image archive at `archive_path` onto
/// `target_dir`.
pub fn unpack_image_archive(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let scratch_parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::Builder::new()
        .prefix("archive_")
        .tempdir_in(scratch_parent)?;

    let file = File::open(archive_path).map_err(|e| {
        CatalogError::Other(format!(
            "Failed to open image archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    Archive::new(file).unpack(scratch.path()).map_err(|e| {
        CatalogError::Other(format!(
            "Failed to read image archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    let manifest_path = scratch.path().join("manifest.json");
    let manifest_data = std::fs::read_to_string(&manifest_path).map_err(|e| {
        CatalogError::Other(format!(
            "Image archive {} has no manifest.json: {}",
            archive_path.display(),
            e
        ))
    })?;
    let manifests: Vec<ArchiveManifest> = serde_json::from_str(&manifest_data)?;
    let manifest = manifests.first().ok_or_else(|| {
        CatalogError::Other(format!(
            "Image archive {} lists no images",
            archive_path.display()
        ))
    })?;

    let layers = manifest
        .layers
        .iter()
        .map(|layer| {
            let relative = Path::new(layer);
            if relative.components().all(|c| matches!(c, Component::Normal(_))) {
                Ok(scratch.path().join(relative))
            } else {
                Err(CatalogError::Other(format!(
                    "Image archive {} lists layer {} outside the archive",
                    archive_path.display(),
                    layer
                )))
            }
        })
        .collect::<Result<Vec<PathBuf>>>()?;

    tracing::debug!(
        archive = %archive_path.display(),
        layers = layers.len(),
        "Applying image archive layers"
    );

    extract_layers(&layers, target_dir)
}
