//! Orchestration of the add and inspect flows.
//!
//! Both flows acquire one registry per request and release it through
//! [`finish`] whatever the outcome. Temporary directories are `TempDir`s
//! and vanish when they go out of scope.

mod add;
mod inspect;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use declcfg_core::error::{CatalogError, Result};

use crate::bundle::{BundleLoader, ManifestBundleLoader};
use crate::registry::{DefaultRegistryFactory, ImageRegistry, RegistryFactory};

/// Adds bundles to package configs and extracts configs from index images.
pub struct ConfigEditor {
    registries: Arc<dyn RegistryFactory>,
    loader: Arc<dyn BundleLoader>,
    workdir: PathBuf,
}

impl Default for ConfigEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEditor {
    /// Editor using the registry backend named by each request and the
    /// manifest bundle loader. Temporary directories go under the current
    /// directory.
    pub fn new() -> Self {
        Self {
            registries: Arc::new(DefaultRegistryFactory),
            loader: Arc::new(ManifestBundleLoader),
            workdir: PathBuf::from("."),
        }
    }

    pub fn with_registry_factory(mut self, factory: impl RegistryFactory + 'static) -> Self {
        self.registries = Arc::new(factory);
        self
    }

    pub fn with_loader(mut self, loader: impl BundleLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Directory that holds temporary unpack directories.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn temp_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.workdir)?;
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.workdir)?)
    }
}

/// Destroy `registry` and hand back `result` untouched.
///
/// A failed destroy is only logged.
async fn finish<T>(mut registry: Box<dyn ImageRegistry>, result: Result<T>) -> Result<T> {
    if let Err(e) = registry.destroy().await {
        tracing::warn!(error = %e, "Failed to destroy local image cache");
    }
    result
}

fn as_pull_error(reference: &str, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::PullError { .. } => err,
        other => CatalogError::PullError {
            reference: reference.to_string(),
            message: other.to_string(),
        },
    }
}

fn as_unpack_error(reference: &str, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::UnpackError { .. } => err,
        other => CatalogError::UnpackError {
            reference: reference.to_string(),
            message: other.to_string(),
        },
    }
}
