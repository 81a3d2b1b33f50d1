//! declcfg Core - Foundational Types
//!
//! This crate provides the types shared by the declcfg runtime and CLI:
//! the error taxonomy, registry and request configuration, and the
//! declarative-config records written to per-package files.

pub mod config;
pub mod declcfg;
pub mod error;

// Re-export commonly used types
pub use config::{AddConfigRequest, ContainerTool, InspectIndexRequest, RegistryOptions};
pub use declcfg::{BundleRecord, ChannelPropertyValue, Icon, PackageRecord, Property};
pub use error::{CatalogError, Result};

/// declcfg version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
