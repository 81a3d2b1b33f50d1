//! OCI image layout parsing.
//!
//! Loads the manifest, the image configuration labels, and the ordered layer
//! blobs of an image stored as an OCI image layout.

use declcfg_core::error::{CatalogError, Result};
use oci_spec::image::{ImageConfiguration, ImageIndex, ImageManifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// An OCI image stored on disk as an image layout.
#[derive(Debug)]
pub struct OciImage {
    /// Labels from the image configuration
    labels: HashMap<String, String>,

    /// Paths to layer blobs (in order, bottom to top)
    layer_paths: Vec<PathBuf>,
}

impl OciImage {
    /// Load an OCI image from a directory.
    ///
    /// The directory must contain `oci-layout`, `index.json` and a `blobs/`
    /// directory holding the manifest, config and layers referenced by the
    /// first manifest of the index.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();

        Self::validate_oci_layout(&root_dir)?;

        let index: ImageIndex = Self::read_json(&root_dir.join("index.json"), "index.json")?;
        let manifest_digest = index
            .manifests()
            .first()
            .ok_or_else(|| CatalogError::Other("No manifests in index.json".to_string()))?
            .digest()
            .to_string();

        let manifest: ImageManifest =
            Self::read_json(&Self::blob_path(&root_dir, &manifest_digest)?, "manifest")?;

        let config: ImageConfiguration = Self::read_json(
            &Self::blob_path(&root_dir, manifest.config().digest())?,
            "config",
        )?;
        let labels = config
            .config()
            .as_ref()
            .and_then(|c| c.labels().clone())
            .unwrap_or_default();

        let layer_paths = manifest
            .layers()
            .iter()
            .map(|layer| Self::blob_path(&root_dir, layer.digest()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            labels,
            layer_paths,
        })
    }

    /// Get the image labels.
    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// Get paths to all layer blobs (in order, bottom to top).
    pub fn layer_paths(&self) -> &[PathBuf] {
        &self.layer_paths
    }

    /// Get the path to a blob by digest.
    pub(crate) fn blob_path(root_dir: &Path, digest: &str) -> Result<PathBuf> {
        Ok(root_dir.join("blobs").join("sha256").join(sha256_hex(digest)?))
    }

    fn validate_oci_layout(root_dir: &Path) -> Result<()> {
        for required in ["oci-layout", "index.json", "blobs"] {
            if !root_dir.join(required).exists() {
                return Err(CatalogError::Other(format!(
                    "Not a valid OCI layout: missing {} in {}",
                    required,
                    root_dir.display()
                )));
            }
        }
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Other(format!(
                "Failed to read {} at {}: {}",
                what,
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CatalogError::Other(format!("Failed to parse {}: {}", what, e)))
    }
}

/// Hex part of a `sha256:<64 hex>` digest.
///
/// Digests name blob files, so anything else is rejected before it can
/// reach a path.
pub(crate) fn sha256_hex(digest: &str) -> Result<&str> {
    let is_hex = |s: &str| s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    match digest.strip_prefix("sha256:") {
        Some(hex) if hex.len() == 64 && is_hex(hex) => Ok(hex),
        _ => Err(CatalogError::Other(format!("Unsupported blob digest '{}'", digest))),
    }
}
