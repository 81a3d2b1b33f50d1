//! Fixtures shared by the unit tests of this crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use declcfg_core::config::RegistryOptions;
use declcfg_core::error::{CatalogError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::registry::{ImageRegistry, RegistryFactory};

/// Build an uncompressed tar stream holding `files`.
pub fn tar_layer(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Build an uncompressed tar stream holding symlinks as `(path, target)`.
pub fn symlink_layer(links: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, target) in links {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, name, target).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Build a gzip-compressed tar stream holding `files`.
pub fn gzip_layer(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_layer(files)).unwrap();
    encoder.finish().unwrap()
}

fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

fn write_blob(blobs: &Path, data: &[u8]) -> String {
    let digest = sha256_digest(data);
    std::fs::write(blobs.join(digest.trim_start_matches("sha256:")), data).unwrap();
    digest
}

/// Write an OCI image layout with the given config labels and layers.
pub fn write_oci_layout(dir: &Path, labels: &[(&str, &str)], layers: &[Vec<u8>]) {
    let blobs = dir.join("blobs").join("sha256");
    std::fs::create_dir_all(&blobs).unwrap();
    std::fs::write(dir.join("oci-layout"), r#"{"imageLayoutVersion":"1.0.0"}"#).unwrap();

    let label_map: HashMap<&str, &str> = labels.iter().copied().collect();
    let config = serde_json::json!({
        "architecture": "amd64",
        "os": "linux",
        "config": { "Labels": label_map },
        "rootfs": { "type": "layers", "diff_ids": [] },
        "history": []
    });
    let config_bytes = serde_json::to_vec(&config).unwrap();
    let config_digest = write_blob(&blobs, &config_bytes);

    let layer_descriptors: Vec<serde_json::Value> = layers
        .iter()
        .map(|layer| {
            serde_json::json!({
                "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                "digest": write_blob(&blobs, layer),
                "size": layer.len()
            })
        })
        .collect();

    let manifest = serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "digest": config_digest,
            "size": config_bytes.len()
        },
        "layers": layer_descriptors
    });
    let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
    let manifest_digest = write_blob(&blobs, &manifest_bytes);

    let index = serde_json::json!({
        "schemaVersion": 2,
        "manifests": [{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": manifest_digest,
            "size": manifest_bytes.len()
        }]
    });
    std::fs::write(dir.join("index.json"), serde_json::to_vec(&index).unwrap()).unwrap();
}

/// Contents of an operator bundle image used by the fixtures.
#[derive(Debug, Clone)]
pub struct BundleFixture {
    pub package: String,
    pub channels: String,
    pub default_channel: String,
    pub csv_name: String,
    pub version: Option<String>,
    pub replaces: String,
    pub skips: Vec<String>,
    pub skip_range: Option<String>,
    pub related_images: Vec<String>,
}

impl BundleFixture {
    pub fn new(package: &str, csv_name: &str, version: &str) -> Self {
        Self {
            package: package.to_string(),
            channels: "alpha,beta".to_string(),
            default_channel: "alpha".to_string(),
            csv_name: csv_name.to_string(),
            version: Some(version.to_string()),
            replaces: String::new(),
            skips: Vec::new(),
            skip_range: None,
            related_images: Vec::new(),
        }
    }

    /// Write `metadata/annotations.yaml` and the CSV under `root`.
    pub fn write_to(&self, root: &Path) {
        let metadata = root.join("metadata");
        let manifests = root.join("manifests");
        std::fs::create_dir_all(&metadata).unwrap();
        std::fs::create_dir_all(&manifests).unwrap();

        let annotations = format!(
            "annotations:\n  \
             operators.operatorframework.io.bundle.mediatype.v1: registry+v1\n  \
             operators.operatorframework.io.bundle.manifests.v1: manifests/\n  \
             operators.operatorframework.io.bundle.metadata.v1: metadata/\n  \
             operators.operatorframework.io.bundle.package.v1: {}\n  \
             operators.operatorframework.io.bundle.channels.v1: {}\n  \
             operators.operatorframework.io.bundle.channel.default.v1: {}\n",
            self.package, self.channels, self.default_channel
        );
        std::fs::write(metadata.join("annotations.yaml"), annotations).unwrap();

        let mut csv = serde_yaml::Mapping::new();
        csv.insert("apiVersion".into(), "operators.coreos.com/v1alpha1".into());
        csv.insert("kind".into(), "ClusterServiceVersion".into());

        let mut meta = serde_yaml::Mapping::new();
        meta.insert("name".into(), self.csv_name.clone().into());
        if let Some(range) = &self.skip_range {
            let mut annotations = serde_yaml::Mapping::new();
            annotations.insert("olm.skipRange".into(), range.clone().into());
            meta.insert("annotations".into(), annotations.into());
        }
        csv.insert("metadata".into(), meta.into());

        let mut spec = serde_yaml::Mapping::new();
        if let Some(version) = &self.version {
            spec.insert("version".into(), version.clone().into());
        }
        if !self.replaces.is_empty() {
            spec.insert("replaces".into(), self.replaces.clone().into());
        }
        if !self.skips.is_empty() {
            let skips: Vec<serde_yaml::Value> =
                self.skips.iter().map(|s| s.clone().into()).collect();
            spec.insert("skips".into(), skips.into());
        }
        if !self.related_images.is_empty() {
            let related: Vec<serde_yaml::Value> = self
                .related_images
                .iter()
                .enumerate()
                .map(|(i, image)| {
                    let mut entry = serde_yaml::Mapping::new();
                    entry.insert("name".into(), format!("image-{}", i).into());
                    entry.insert("image".into(), image.clone().into());
                    entry.into()
                })
                .collect();
            spec.insert("relatedImages".into(), related.into());
        }
        csv.insert("spec".into(), spec.into());

        let file = manifests.join(format!("{}.clusterserviceversion.yaml", self.package));
        std::fs::write(file, serde_yaml::to_string(&csv).unwrap()).unwrap();
    }
}

/// What a [`FakeRegistry`] serves for one reference.
#[derive(Debug, Clone)]
pub enum FakeImage {
    /// An operator bundle
    Bundle(BundleFixture),
    /// An index image with labels, files and symlinks as `(path, target)`,
    /// paths relative to the image root
    Index {
        labels: Vec<(String, String)>,
        files: Vec<(String, String)>,
        links: Vec<(String, String)>,
    },
}

/// Shared call log of fake registries.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// In-memory registry that records every call it receives.
pub struct FakeRegistry {
    images: HashMap<String, FakeImage>,
    calls: CallLog,
    fail_destroy: bool,
}

#[async_trait]
impl ImageRegistry for FakeRegistry {
    async fn pull(&mut self, reference: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("pull {}", reference));
        if self.images.contains_key(reference) {
            Ok(())
        } else {
            Err(CatalogError::PullError {
                reference: reference.to_string(),
                message: "manifest unknown".to_string(),
            })
        }
    }

    async fn labels(&self, reference: &str) -> Result<HashMap<String, String>> {
        self.calls.lock().unwrap().push(format!("labels {}", reference));
        match self.images.get(reference) {
            Some(FakeImage::Index { labels, .. }) => Ok(labels.iter().cloned().collect()),
            Some(FakeImage::Bundle(_)) => Ok(HashMap::new()),
            None => Err(CatalogError::Other(format!("image {} not pulled", reference))),
        }
    }

    async fn unpack(&self, reference: &str, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(format!("unpack {}", reference));
        match self.images.get(reference) {
            Some(FakeImage::Bundle(bundle)) => bundle.write_to(dest),
            Some(FakeImage::Index { files, links, .. }) => {
                for (path, content) in files {
                    let target = dest.join(path);
                    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
                    std::fs::write(target, content).unwrap();
                }
                for (path, link_target) in links {
                    let link = dest.join(path);
                    std::fs::create_dir_all(link.parent().unwrap()).unwrap();
                    #[cfg(unix)]
                    std::os::unix::fs::symlink(link_target, &link).unwrap();
                    #[cfg(not(unix))]
                    let _ = (link_target, link);
                }
            }
            None => {
                return Err(CatalogError::UnpackError {
                    reference: reference.to_string(),
                    message: "not pulled".to_string(),
                })
            }
        }
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("destroy".to_string());
        if self.fail_destroy {
            return Err(CatalogError::Other("cache busy".to_string()));
        }
        Ok(())
    }
}

/// Factory handing out [`FakeRegistry`] instances over a fixed image set.
#[derive(Default)]
pub struct FakeRegistryFactory {
    images: HashMap<String, FakeImage>,
    pub calls: CallLog,
    fail_destroy: bool,
}

impl FakeRegistryFactory {
    pub fn with_image(mut self, reference: &str, image: FakeImage) -> Self {
        self.images.insert(reference.to_string(), image);
        self
    }

    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }
}

#[async_trait]
impl RegistryFactory for FakeRegistryFactory {
    async fn create(&self, _options: &RegistryOptions) -> Result<Box<dyn ImageRegistry>> {
        Ok(Box::new(FakeRegistry {
            images: self.images.clone(),
            calls: self.calls.clone(),
            fail_destroy: self.fail_destroy,
        }))
    }
}
