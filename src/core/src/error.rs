use std::path::PathBuf;

use thiserror::Error;

/// declcfg error types
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Registry or network failure while pulling an image
    #[error("Error pulling image {reference} from remote registry: {message}")]
    PullError { reference: String, message: String },

    /// A catalog image does not carry a required metadata label
    #[error("Index image {image} missing label {label}")]
    LabelMissingError { image: String, label: String },

    /// Materializing an image filesystem failed
    #[error("Error unpacking image {reference}: {message}")]
    UnpackError { reference: String, message: String },

    /// Bundle metadata lacks a field required to build config records
    #[error("Bundle {bundle} is missing required field: {field}")]
    SynthesisError { bundle: String, field: String },

    /// Creating or appending a package config file failed
    #[error("Error writing config {}: {message}", path.display())]
    WriteError { path: PathBuf, message: String },

    /// Bundle metadata could not be read or parsed
    #[error("Invalid bundle at {}: {message}", path.display())]
    InvalidBundle { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CatalogError {
    /// Build a `SynthesisError` for a bundle missing `field`.
    pub fn missing_field(bundle: impl Into<String>, field: impl Into<String>) -> Self {
        CatalogError::SynthesisError {
            bundle: bundle.into(),
            field: field.into(),
        }
    }

    /// Build a `WriteError` from an I/O failure on `path`.
    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        CatalogError::WriteError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CatalogError {
    fn from(err: serde_yaml::Error) -> Self {
        CatalogError::SerializationError(err.to_string())
    }
}

/// Result type alias for declcfg operations
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_error_display() {
        let error = CatalogError::PullError {
            reference: "quay.io/org/index:v1".to_string(),
            message: "manifest unknown".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Error pulling image quay.io/org/index:v1 from remote registry: manifest unknown"
        );
    }

    #[test]
    fn test_label_missing_error_display() {
        let error = CatalogError::LabelMissingError {
            image: "quay.io/org/index:v1".to_string(),
            label: "operators.operatorframework.io.configs.v1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Index image quay.io/org/index:v1 missing label operators.operatorframework.io.configs.v1"
        );
    }

    #[test]
    fn test_synthesis_error_names_field() {
        let error = CatalogError::missing_field("quay.io/org/bundle:v1", "version");
        assert_eq!(
            error.to_string(),
            "Bundle quay.io/org/bundle:v1 is missing required field: version"
        );
    }

    #[test]
    fn test_write_error_display() {
        let error = CatalogError::write("/tmp/configs/etcd.json", "permission denied");
        assert_eq!(
            error.to_string(),
            "Error writing config /tmp/configs/etcd.json: permission denied"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CatalogError = io_error.into();
        assert!(matches!(err, CatalogError::IoError(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: CatalogError = result.unwrap_err().into();
        assert!(matches!(err, CatalogError::SerializationError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let err: CatalogError = result.unwrap_err().into();
        assert!(matches!(err, CatalogError::SerializationError(_)));
    }
}
