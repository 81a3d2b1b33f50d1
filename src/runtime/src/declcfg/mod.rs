//! Declarative-config synthesis and per-package file merging.

mod synthesize;
mod writer;

pub use synthesize::{new_config_bundle, new_config_package, synthesize};
pub use writer::{to_catalog_json, ConfigWriter};
