//! Registry backend that speaks the distribution protocol directly.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use declcfg_core::error::{CatalogError, Result};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use super::ImageRegistry;
use crate::oci::registry::{RegistryAuth, RegistryPuller, TlsOptions};
use crate::oci::{extract_layers, OciImage};

/// Pulls images over HTTPS into a private cache of OCI image layouts.
///
/// The cache lives in a temporary directory that is removed by
/// [`ImageRegistry::destroy`], or when the registry is dropped.
pub struct DirectRegistry {
    puller: RegistryPuller,
    cache: Option<TempDir>,
    images: HashMap<String, OciImage>,
}

impl DirectRegistry {
    /// Create a registry trusting the extra root CAs in `ca_file`.
    pub fn new(ca_file: Option<&Path>, skip_tls: bool) -> Result<Self> {
        let tls = TlsOptions::from_ca_file(ca_file, skip_tls)?;
        let cache = tempfile::Builder::new().prefix("declcfg-cache-").tempdir()?;

        tracing::debug!(
            cache = %cache.path().display(),
            skip_tls,
            "Initialized local image cache"
        );

        Ok(Self {
            puller: RegistryPuller::new(RegistryAuth::from_env(), &tls),
            cache: Some(cache),
            images: HashMap::new(),
        })
    }

    fn image(&self, reference: &str) -> Result<&OciImage> {
        self.images.get(reference).ok_or_else(|| {
            CatalogError::Other(format!("image {} has not been pulled", reference))
        })
    }

    fn cache_dir(&self) -> Result<&Path> {
        self.cache
            .as_ref()
            .map(|c| c.path())
            .ok_or_else(|| CatalogError::Other("image cache has been destroyed".to_string()))
    }
}

#[async_trait]
impl ImageRegistry for DirectRegistry {
    async fn pull(&mut self, reference: &str) -> Result<()> {
        if self.images.contains_key(reference) {
            tracing::debug!(reference = %reference, "Using cached image");
            return Ok(());
        }

        let key = hex::encode(Sha256::digest(reference.as_bytes()));
        let layout_dir = self.cache_dir()?.join(&key[..16]);
        if layout_dir.exists() {
            std::fs::remove_dir_all(&layout_dir)?;
        }

        self.puller.pull(reference, &layout_dir).await?;
        let image = OciImage::from_path(&layout_dir).map_err(|e| CatalogError::PullError {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;
        self.images.insert(reference.to_string(), image);
        Ok(())
    }

    async fn labels(&self, reference: &str) -> Result<HashMap<String, String>> {
        Ok(self.image(reference)?.labels().clone())
    }

    async fn unpack(&self, reference: &str, dest: &Path) -> Result<()> {
        let layers = self.image(reference)?.layer_paths().to_vec();
        let target = dest.to_path_buf();

        tokio::task::spawn_blocking(move || extract_layers(&layers, &target))
            .await
            .map_err(|e| CatalogError::Other(format!("unpack task failed: {}", e)))?
            .map_err(|e| CatalogError::UnpackError {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            reference = %reference,
            dest = %dest.display(),
            "Unpacked image"
        );
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.images.clear();
        if let Some(cache) = self.cache.take() {
            let path = cache.path().to_path_buf();
            cache.close().map_err(|e| {
                CatalogError::Other(format!(
                    "failed to remove image cache {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
