//! Image registry backends.
//!
//! Every backend exposes the same four capabilities: pull an image into a
//! local cache, read its labels, unpack its filesystem, and release the
//! cache. The backend is picked from [`ContainerTool`] when it is built.
//!
//! | Tool               | Backend          | Mechanism                          |
//! |--------------------|------------------|------------------------------------|
//! | `none`             | [`DirectRegistry`] | distribution protocol, OCI layouts |
//! | `docker`, `podman` | [`ExecRegistry`]   | engine binary (`pull`/`save`)      |

mod direct;
mod exec;

pub use direct::DirectRegistry;
pub use exec::ExecRegistry;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use declcfg_core::config::{ContainerTool, RegistryOptions};
use declcfg_core::error::Result;

/// Pull, inspect, unpack, and release container images.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Fetch `reference` into the local cache. A cached image is not fetched again.
    async fn pull(&mut self, reference: &str) -> Result<()>;

    /// Labels of a previously pulled image.
    async fn labels(&self, reference: &str) -> Result<HashMap<String, String>>;

    /// Materialize the filesystem of a previously pulled image under `dest`.
    async fn unpack(&self, reference: &str, dest: &Path) -> Result<()>;

    /// Release the local cache.
    async fn destroy(&mut self) -> Result<()>;
}

/// Builds registries for a request.
#[async_trait]
pub trait RegistryFactory: Send + Sync {
    async fn create(&self, options: &RegistryOptions) -> Result<Box<dyn ImageRegistry>>;
}

/// Factory backed by [`new_registry`].
#[derive(Debug, Default, Clone)]
pub struct DefaultRegistryFactory;

#[async_trait]
impl RegistryFactory for DefaultRegistryFactory {
    async fn create(&self, options: &RegistryOptions) -> Result<Box<dyn ImageRegistry>> {
        new_registry(options)
    }
}

/// Build the registry backend selected by `options.tool`.
pub fn new_registry(options: &RegistryOptions) -> Result<Box<dyn ImageRegistry>> {
    let registry: Box<dyn ImageRegistry> = match options.tool {
        ContainerTool::None => Box::new(DirectRegistry::new(
            options.ca_file.as_deref(),
            options.skip_tls,
        )?),
        ContainerTool::Docker | ContainerTool::Podman => {
            Box::new(ExecRegistry::new(options.tool, options.skip_tls)?)
        }
    };

    tracing::debug!(tool = %options.tool, "Created image registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declcfg_core::error::CatalogError;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_default_factory_builds_direct_registry() {
        let mut registry = DefaultRegistryFactory
            .create(&RegistryOptions::default())
            .await
            .unwrap();
        registry.destroy().await.unwrap();
    }

    #[test]
    fn test_new_registry_rejects_unreadable_ca_file() {
        let options = RegistryOptions {
            tool: ContainerTool::None,
            ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            skip_tls: false,
        };
        let err = new_registry(&options).err().unwrap();
        assert!(matches!(err, CatalogError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_new_registry_exec_backend() {
        let options = RegistryOptions {
            tool: ContainerTool::Podman,
            ca_file: None,
            skip_tls: true,
        };
        let mut registry = new_registry(&options).unwrap();
        registry.destroy().await.unwrap();
    }
}
