use declcfg_core::config::AddConfigRequest;
use declcfg_core::error::{CatalogError, Result};

use super::{as_pull_error, as_unpack_error, finish, ConfigEditor};
use crate::declcfg::{synthesize, ConfigWriter};
use crate::registry::ImageRegistry;

const BUNDLE_TMP_DIR_PREFIX: &str = "bundle_";

impl ConfigEditor {
    /// Add every bundle in `request` to the config file of its package.
    ///
    /// Bundles are processed in order and the first failure stops the batch.
    /// Entries written before the failure stay on disk.
    pub async fn add_to_config(&self, request: &AddConfigRequest) -> Result<()> {
        let mut registry = self.registries.create(&request.registry).await?;
        let result = self.add_bundles(registry.as_mut(), request).await;
        finish(registry, result).await
    }

    async fn add_bundles(
        &self,
        registry: &mut dyn ImageRegistry,
        request: &AddConfigRequest,
    ) -> Result<()> {
        std::fs::create_dir_all(&request.config_folder)
            .map_err(|e| CatalogError::write(&request.config_folder, e))?;

        for reference in &request.bundles {
            let bundle_dir = self.temp_dir(BUNDLE_TMP_DIR_PREFIX)?;

            registry
                .pull(reference)
                .await
                .map_err(|e| as_pull_error(reference, e))?;
            registry
                .unpack(reference, bundle_dir.path())
                .await
                .map_err(|e| as_unpack_error(reference, e))?;

            let view = self.loader.load(bundle_dir.path(), reference)?;
            let (package, bundle) = synthesize(&view)?;
            let path = ConfigWriter::merge(&request.config_folder, &package, &bundle)?;

            tracing::info!(
                reference = %reference,
                package = %package.name,
                bundle = %bundle.name,
                config = %path.display(),
                "Added bundle to config"
            );
        }

        Ok(())
    }
}
