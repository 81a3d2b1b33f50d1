//! OCI registry client for pulling images.
//!
//! Uses the `oci-distribution` crate to talk to container registries and
//! writes pulled images as OCI image layouts.

use std::path::{Path, PathBuf};

use declcfg_core::error::{CatalogError, Result};
use oci_distribution::client::{
    Certificate, CertificateEncoding, ClientConfig, ClientProtocol,
};
use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor, OciImageManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use sha2::{Digest, Sha256};

use super::image::sha256_hex;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// TLS settings for registry connections.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM-encoded extra root certificates
    pub root_ca_pem: Option<Vec<u8>>,

    /// Accept any server certificate
    pub skip_verify: bool,
}

impl TlsOptions {
    /// Load the extra root CAs from a PEM bundle on disk.
    pub fn from_ca_file(ca_file: Option<&Path>, skip_verify: bool) -> Result<Self> {
        let root_ca_pem = match ca_file {
            Some(path) => Some(std::fs::read(path).map_err(|e| {
                CatalogError::ConfigError(format!(
                    "failed to get RootCAs from {}: {}",
                    path.display(),
                    e
                ))
            })?),
            None => None,
        };
        Ok(Self {
            root_ca_pem,
            skip_verify,
        })
    }
}

/// Pulls OCI images from container registries.
pub struct RegistryPuller {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryPuller {
    /// Create a new registry puller.
    pub fn new(auth: RegistryAuth, tls: &TlsOptions) -> Self {
        let extra_root_certificates = tls
            .root_ca_pem
            .iter()
            .map(|pem| Certificate {
                encoding: CertificateEncoding::Pem,
                data: pem.clone(),
            })
            .collect();

        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            accept_invalid_certificates: tls.skip_verify,
            extra_root_certificates,
            platform_resolver: Some(Box::new(linux_platform_resolver)),
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth,
        }
    }

    /// Pull an image and write it as an OCI image layout to `target_dir`.
    ///
    /// Returns the manifest digest.
    pub async fn pull(&self, reference: &str, target_dir: &Path) -> Result<String> {
        let oci_ref = parse_reference(reference)?;
        let pull_err = |message: String| CatalogError::PullError {
            reference: reference.to_string(),
            message,
        };

        tracing::info!(
            reference = %reference,
            target = %target_dir.display(),
            "Pulling image from registry"
        );

        let blobs_dir = target_dir.join("blobs").join("sha256");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| pull_err(format!("Failed to create blobs directory: {}", e)))?;

        let auth = self.auth.to_oci_auth();
        let (image_manifest, manifest_digest) = self
            .client
            .pull_image_manifest(&oci_ref, &auth)
            .await
            .map_err(|e| pull_err(format!("Failed to pull manifest: {}", e)))?;

        let manifest_json = serde_json::to_vec(&image_manifest)?;
        let manifest_hex = sha256_hex(&manifest_digest).map_err(|e| pull_err(e.to_string()))?;
        std::fs::write(blobs_dir.join(manifest_hex), &manifest_json)
            .map_err(|e| pull_err(format!("Failed to write manifest: {}", e)))?;

        self.pull_image_content(&oci_ref, &image_manifest, &blobs_dir)
            .await
            .map_err(|e| match e {
                CatalogError::PullError { .. } => e,
                other => pull_err(other.to_string()),
            })?;

        std::fs::write(
            target_dir.join("oci-layout"),
            r#"{"imageLayoutVersion":"1.0.0"}"#,
        )
        .map_err(|e| pull_err(format!("Failed to write oci-layout: {}", e)))?;

        let index = serde_json::json!({
            "schemaVersion": 2,
            "manifests": [{
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": manifest_digest,
                "size": manifest_json.len()
            }]
        });
        std::fs::write(
            target_dir.join("index.json"),
            serde_json::to_string_pretty(&index)?,
        )
        .map_err(|e| pull_err(format!("Failed to write index.json: {}", e)))?;

        tracing::info!(
            reference = %reference,
            digest = %manifest_digest,
            "Image pulled successfully"
        );

        Ok(manifest_digest)
    }

    /// Pull config and layers for an image manifest, writing blobs to disk.
    async fn pull_image_content(
        &self,
        oci_ref: &Reference,
        manifest: &OciImageManifest,
        blobs_dir: &Path,
    ) -> Result<()> {
        self.pull_verified_blob(oci_ref, &manifest.config, blobs_dir)
            .await?;

        for layer in &manifest.layers {
            tracing::debug!(
                digest = %layer.digest,
                size = layer.size,
                "Pulling layer"
            );
            self.pull_verified_blob(oci_ref, layer, blobs_dir).await?;
        }

        Ok(())
    }

    async fn pull_verified_blob(
        &self,
        oci_ref: &Reference,
        descriptor: &OciDescriptor,
        blobs_dir: &Path,
    ) -> Result<PathBuf> {
        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(oci_ref, descriptor, &mut data)
            .await
            .map_err(|e| CatalogError::PullError {
                reference: oci_ref.whole(),
                message: format!("Failed to pull blob {}: {}", descriptor.digest, e),
            })?;

        let path = blobs_dir.join(verify_digest(&descriptor.digest, &data)?);
        std::fs::write(&path, &data).map_err(|e| CatalogError::PullError {
            reference: oci_ref.whole(),
            message: format!("Failed to write blob {}: {}", descriptor.digest, e),
        })?;
        Ok(path)
    }
}

/// Parse an image reference, applying docker-style defaults.
pub fn parse_reference(reference: &str) -> Result<Reference> {
    reference.trim().parse::<Reference>().map_err(|e| {
        CatalogError::ConfigError(format!("Invalid image reference '{}': {}", reference, e))
    })
}

/// Check `data` against a `sha256:<hex>` digest and return the hex part.
///
/// Blobs under any other algorithm cannot be verified and are rejected.
fn verify_digest<'a>(digest: &'a str, data: &[u8]) -> Result<&'a str> {
    let expected = sha256_hex(digest)?;
    let actual = hex::encode(Sha256::digest(data));
    if actual != expected {
        return Err(CatalogError::Other(format!(
            "Digest mismatch: expected sha256:{}, got sha256:{}",
            expected, actual
        )));
    }
    Ok(expected)
}

/// Platform resolver that selects linux images matching the host architecture.
fn linux_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };

    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .map_or(false, |p| p.os == "linux" && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}
