//! Typed view over an unpacked operator bundle.
//!
//! A bundle image carries `metadata/annotations.yaml` (package and channel
//! membership), an optional `metadata/properties.yaml`, and a manifests
//! directory holding the ClusterServiceVersion.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use declcfg_core::declcfg::Property;
use declcfg_core::error::{CatalogError, Result};
use serde::Deserialize;

/// Annotation naming the package a bundle belongs to.
pub const PACKAGE_ANNOTATION: &str = "operators.operatorframework.io.bundle.package.v1";

/// Annotation listing the channels a bundle is a member of, comma separated.
pub const CHANNELS_ANNOTATION: &str = "operators.operatorframework.io.bundle.channels.v1";

/// Annotation naming the package's default channel.
pub const DEFAULT_CHANNEL_ANNOTATION: &str =
    "operators.operatorframework.io.bundle.channel.default.v1";

/// Annotation holding the manifests directory, relative to the bundle root.
pub const MANIFESTS_ANNOTATION: &str = "operators.operatorframework.io.bundle.manifests.v1";

/// CSV annotation holding the skip range.
pub const SKIP_RANGE_ANNOTATION: &str = "olm.skipRange";

const CSV_KIND: &str = "ClusterServiceVersion";
const DEFAULT_MANIFESTS_DIR: &str = "manifests/";

/// Everything synthesis needs to know about one bundle.
///
/// Empty strings stand for absent values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleView {
    /// Image reference the bundle was unpacked from
    pub image: String,
    /// Name of the ClusterServiceVersion
    pub csv_name: String,
    pub package: String,
    pub version: String,
    pub default_channel: String,
    /// Channels annotation as written by the bundle author
    pub channels_annotation: String,
    /// Normalized channel membership, in declared order
    pub channels: Vec<String>,
    pub replaces: String,
    pub skips: Vec<String>,
    pub skip_range: String,
    /// Properties declared by the bundle itself
    pub properties: Vec<Property>,
    pub related_images: BTreeSet<String>,
}

/// Split a channels annotation into unique, non-empty channel names.
pub fn split_channels(raw: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !channels.iter().any(|c| c == name) {
            channels.push(name.to_string());
        }
    }
    channels
}

/// Reads a [`BundleView`] out of an unpacked bundle directory.
pub trait BundleLoader: Send + Sync {
    fn load(&self, bundle_dir: &Path, image: &str) -> Result<BundleView>;
}

/// Loads bundles in the `registry+v1` manifest format.
#[derive(Debug, Default, Clone)]
pub struct ManifestBundleLoader;

#[derive(Debug, Deserialize)]
struct AnnotationsFile {
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PropertiesFile {
    #[serde(default)]
    properties: Vec<Property>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterServiceVersion {
    #[serde(default)]
    metadata: CsvMetadata,
    #[serde(default)]
    spec: CsvSpec,
}

#[derive(Debug, Default, Deserialize)]
struct CsvMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvSpec {
    #[serde(default)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    replaces: Option<String>,
    #[serde(default)]
    skips: Vec<String>,
    #[serde(default)]
    related_images: Vec<RelatedImage>,
}

#[derive(Debug, Deserialize)]
struct RelatedImage {
    image: String,
}

impl ManifestBundleLoader {
    fn read_annotations(&self, bundle_dir: &Path) -> Result<HashMap<String, String>> {
        let metadata = bundle_dir.join("metadata");
        let path = ["annotations.yaml", "annotations.yml"]
            .iter()
            .map(|name| metadata.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| CatalogError::InvalidBundle {
                path: metadata.clone(),
                message: "no annotations.yaml found".to_string(),
            })?;

        let text = std::fs::read_to_string(&path)?;
        let file: AnnotationsFile =
            serde_yaml::from_str(&text).map_err(|e| CatalogError::InvalidBundle {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(file.annotations)
    }

    fn read_properties(&self, bundle_dir: &Path) -> Result<Vec<Property>> {
        let path = bundle_dir.join("metadata").join("properties.yaml");
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)?;
        let file: PropertiesFile =
            serde_yaml::from_str(&text).map_err(|e| CatalogError::InvalidBundle {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(file.properties)
    }

    /// Find the ClusterServiceVersion among the manifests.
    fn read_csv(&self, manifests_dir: &Path) -> Result<Option<ClusterServiceVersion>> {
        if !manifests_dir.is_dir() {
            return Err(CatalogError::InvalidBundle {
                path: manifests_dir.to_path_buf(),
                message: "manifests directory not found".to_string(),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(manifests_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml") | Some("json")
                    )
            })
            .collect();
        files.sort();

        for path in files {
            let text = std::fs::read_to_string(&path)?;
            for document in serde_yaml::Deserializer::from_str(&text) {
                let value = match serde_yaml::Value::deserialize(document) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Skipping unparsable manifest");
                        break;
                    }
                };
                if value.get("kind").and_then(|k| k.as_str()) != Some(CSV_KIND) {
                    continue;
                }
                let csv = serde_yaml::from_value(value).map_err(|e| CatalogError::InvalidBundle {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                return Ok(Some(csv));
            }
        }
        Ok(None)
    }
}

fn version_string(value: Option<&serde_yaml::Value>) -> String {
    match value {
        Some(serde_yaml::Value::String(s)) => s.clone(),
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl BundleLoader for ManifestBundleLoader {
    fn load(&self, bundle_dir: &Path, image: &str) -> Result<BundleView> {
        let annotations = self.read_annotations(bundle_dir)?;
        let annotation = |key: &str| annotations.get(key).cloned().unwrap_or_default();

        let manifests = annotations
            .get(MANIFESTS_ANNOTATION)
            .map(String::as_str)
            .unwrap_or(DEFAULT_MANIFESTS_DIR);
        let manifests_dir = bundle_dir.join(manifests.trim_start_matches('/'));

        let csv = match self.read_csv(&manifests_dir)? {
            Some(csv) => csv,
            None => {
                tracing::warn!(
                    image = %image,
                    dir = %manifests_dir.display(),
                    "Bundle has no ClusterServiceVersion"
                );
                ClusterServiceVersion::default()
            }
        };

        let channels_annotation = annotation(CHANNELS_ANNOTATION);
        let view = BundleView {
            image: image.to_string(),
            csv_name: csv.metadata.name,
            package: annotation(PACKAGE_ANNOTATION),
            version: version_string(csv.spec.version.as_ref()),
            default_channel: annotation(DEFAULT_CHANNEL_ANNOTATION),
            channels: split_channels(&channels_annotation),
            channels_annotation,
            replaces: csv.spec.replaces.unwrap_or_default(),
            skips: csv.spec.skips,
            skip_range: csv
                .metadata
                .annotations
                .get(SKIP_RANGE_ANNOTATION)
                .cloned()
                .unwrap_or_default(),
            properties: self.read_properties(bundle_dir)?,
            related_images: csv
                .spec
                .related_images
                .into_iter()
                .map(|r| r.image)
                .collect(),
        };

        tracing::debug!(
            image = %image,
            package = %view.package,
            csv = %view.csv_name,
            "Loaded bundle"
        );
        Ok(view)
    }
}
