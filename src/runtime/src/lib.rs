//! declcfg Runtime - image handling and config synthesis.
//!
//! This crate pulls and unpacks operator bundle and index images, turns
//! bundle metadata into declarative-config records, and merges them into
//! per-package config files.

#![allow(clippy::result_large_err)]

pub mod bundle;
pub mod declcfg;
pub mod editor;
pub mod oci;
pub mod registry;

#[cfg(test)]
mod testutil;

// Re-export common types
pub use bundle::{BundleLoader, BundleView, ManifestBundleLoader};
pub use declcfg::{new_config_bundle, new_config_package, synthesize, ConfigWriter};
pub use editor::ConfigEditor;
pub use oci::{OciImage, RegistryAuth, RegistryPuller, TlsOptions};
pub use registry::{
    new_registry, DefaultRegistryFactory, DirectRegistry, ExecRegistry, ImageRegistry,
    RegistryFactory,
};

/// declcfg runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
