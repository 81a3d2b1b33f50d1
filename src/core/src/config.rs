use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CatalogError;

/// Label on an index image whose value is the in-image path of the
/// declarative config directory.
pub const CONFIGS_LOCATION_LABEL: &str = "operators.operatorframework.io.configs.v1";

/// Directory that `index inspect` unpacks configs into by default.
pub const DEFAULT_INSPECT_DIR: &str = "configs";

/// Prefix for temporary image unpack directories.
pub const UNPACK_TMP_DIR_PREFIX: &str = "tmp_unpack_";

/// Tool used to pull and unpack container images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerTool {
    /// Talk to the registry directly, no container engine required
    #[default]
    None,
    /// Delegate to a local `docker` binary
    Docker,
    /// Delegate to a local `podman` binary
    Podman,
}

impl ContainerTool {
    /// Name of the engine binary, `None` for the direct backend.
    pub fn binary(&self) -> Option<&'static str> {
        match self {
            ContainerTool::None => None,
            ContainerTool::Docker => Some("docker"),
            ContainerTool::Podman => Some("podman"),
        }
    }
}

impl fmt::Display for ContainerTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerTool::None => "none",
            ContainerTool::Docker => "docker",
            ContainerTool::Podman => "podman",
        };
        f.write_str(name)
    }
}

impl FromStr for ContainerTool {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ContainerTool::None),
            "docker" => Ok(ContainerTool::Docker),
            "podman" => Ok(ContainerTool::Podman),
            other => Err(CatalogError::ConfigError(format!(
                "unknown container tool '{}', expected one of: none, docker, podman",
                other
            ))),
        }
    }
}

/// Registry backend configuration shared by the add and inspect flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOptions {
    /// Backend selector
    pub tool: ContainerTool,

    /// PEM bundle of extra root CAs (direct backend only)
    pub ca_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    pub skip_tls: bool,
}

impl RegistryOptions {
    /// Build options from the environment.
    ///
    /// Reads `DECLCFG_CONTAINER_TOOL`, `DECLCFG_CA_FILE` and
    /// `DECLCFG_SKIP_TLS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, CatalogError> {
        let tool = match std::env::var("DECLCFG_CONTAINER_TOOL") {
            Ok(value) => value.parse()?,
            Err(_) => ContainerTool::default(),
        };
        let ca_file = std::env::var("DECLCFG_CA_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let skip_tls = std::env::var("DECLCFG_SKIP_TLS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            tool,
            ca_file,
            skip_tls,
        })
    }
}

/// Request to add bundles to their package configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddConfigRequest {
    /// Bundle image references, processed in order
    pub bundles: Vec<String>,

    /// Folder holding one `<package>.json` per package
    pub config_folder: PathBuf,

    /// Registry backend configuration
    pub registry: RegistryOptions,
}

/// Request to unpack the package configs stored in an index image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectIndexRequest {
    /// Index image reference
    pub image: String,

    /// Destination directory for the extracted configs
    pub output_dir: PathBuf,

    /// Registry backend configuration
    pub registry: RegistryOptions,
}

impl InspectIndexRequest {
    /// Create a request that extracts into `./configs`.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            output_dir: PathBuf::from(DEFAULT_INSPECT_DIR),
            registry: RegistryOptions::default(),
        }
    }
}
