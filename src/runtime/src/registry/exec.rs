//! Registry backend that delegates to a local container engine.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use declcfg_core::config::ContainerTool;
use declcfg_core::error::{CatalogError, Result};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::process::Command;

use super::ImageRegistry;
use crate::oci::unpack_image_archive;

/// Shells out to `docker` or `podman`.
///
/// Images are cached by the engine itself; the registry only keeps a working
/// directory for saved archives.
pub struct ExecRegistry {
    tool: ContainerTool,
    binary: &'static str,
    skip_tls: bool,
    workdir: Option<TempDir>,
    pulled: HashSet<String>,
}

impl ExecRegistry {
    pub fn new(tool: ContainerTool, skip_tls: bool) -> Result<Self> {
        let binary = tool.binary().ok_or_else(|| {
            CatalogError::ConfigError(format!("container tool '{}' has no engine binary", tool))
        })?;
        let workdir = tempfile::Builder::new().prefix("declcfg-exec-").tempdir()?;

        Ok(Self {
            tool,
            binary,
            skip_tls,
            workdir: Some(workdir),
            pulled: HashSet::new(),
        })
    }

    fn pull_args(&self, reference: &str) -> Vec<String> {
        let mut args = vec!["pull".to_string()];
        if self.skip_tls {
            match self.tool {
                ContainerTool::Podman => args.push("--tls-verify=false".to_string()),
                _ => tracing::warn!(
                    tool = %self.tool,
                    "Skipping TLS verification is not supported by this tool, configure the daemon instead"
                ),
            }
        }
        args.push(reference.to_string());
        args
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>> {
        tracing::debug!(command = %format!("{} {}", self.binary, args.join(" ")), "Running container tool");

        let output = Command::new(self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CatalogError::Other(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(CatalogError::Other(format!(
                "{} {} failed ({}): {}",
                self.binary,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Parse the output of `image inspect --format '{{json .Config.Labels}}'`.
fn parse_labels(stdout: &[u8]) -> Result<HashMap<String, String>> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(HashMap::new());
    }
    let labels: Option<HashMap<String, String>> = serde_json::from_str(text)?;
    Ok(labels.unwrap_or_default())
}

#[async_trait]
impl ImageRegistry for ExecRegistry {
    async fn pull(&mut self, reference: &str) -> Result<()> {
        if self.pulled.contains(reference) {
            tracing::debug!(reference = %reference, "Image already pulled");
            return Ok(());
        }

        tracing::info!(reference = %reference, tool = %self.tool, "Pulling image");
        let args = self.pull_args(reference);
        self.run(&args)
            .await
            .map_err(|e| CatalogError::PullError {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        self.pulled.insert(reference.to_string());
        Ok(())
    }

    async fn labels(&self, reference: &str) -> Result<HashMap<String, String>> {
        let args = [
            "image".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .Config.Labels}}".to_string(),
            reference.to_string(),
        ];
        let stdout = self.run(&args).await?;
        parse_labels(&stdout)
    }

    async fn unpack(&self, reference: &str, dest: &Path) -> Result<()> {
        let unpack_err = |message: String| CatalogError::UnpackError {
            reference: reference.to_string(),
            message,
        };

        let workdir = self
            .workdir
            .as_ref()
            .ok_or_else(|| unpack_err("registry has been destroyed".to_string()))?;
        let key = hex::encode(Sha256::digest(reference.as_bytes()));
        let archive = workdir.path().join(format!("{}.tar", &key[..16]));

        let args = [
            "save".to_string(),
            "-o".to_string(),
            archive.display().to_string(),
            reference.to_string(),
        ];
        self.run(&args).await.map_err(|e| unpack_err(e.to_string()))?;

        let archive_path = archive.clone();
        let target = dest.to_path_buf();
        let result = tokio::task::spawn_blocking(move || unpack_image_archive(&archive_path, &target))
            .await
            .map_err(|e| unpack_err(format!("unpack task failed: {}", e)))?;

        if let Err(e) = std::fs::remove_file(&archive) {
            tracing::warn!(archive = %archive.display(), error = %e, "Failed to remove saved image archive");
        }
        result.map_err(|e| unpack_err(e.to_string()))?;

        tracing::debug!(
            reference = %reference,
            dest = %dest.display(),
            "Unpacked image"
        );
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.pulled.clear();
        if let Some(workdir) = self.workdir.take() {
            workdir.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_none_tool() {
        let err = ExecRegistry::new(ContainerTool::None, false).err().unwrap();
        assert!(matches!(err, CatalogError::ConfigError(_)));
    }

    #[test]
    fn test_pull_args_podman_skip_tls() {
        let registry = ExecRegistry::new(ContainerTool::Podman, true).unwrap();
        assert_eq!(
            registry.pull_args("quay.io/org/bundle:v1"),
            vec!["pull", "--tls-verify=false", "quay.io/org/bundle:v1"]
        );
    }

    #[test]
    fn test_pull_args_docker_ignores_skip_tls() {
        let registry = ExecRegistry::new(ContainerTool::Docker, true).unwrap();
        assert_eq!(
            registry.pull_args("quay.io/org/bundle:v1"),
            vec!["pull", "quay.io/org/bundle:v1"]
        );
    }

    #[test]
    fn test_parse_labels() {
        let labels =
            parse_labels(b"{\"operators.operatorframework.io.configs.v1\":\"/configs\"}\n").unwrap();
        assert_eq!(
            labels.get("operators.operatorframework.io.configs.v1").map(String::as_str),
            Some("/configs")
        );
    }

    #[test]
    fn test_parse_labels_null_and_empty() {
        assert!(parse_labels(b"null\n").unwrap().is_empty());
        assert!(parse_labels(b"").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_removes_workdir() {
        let mut registry = ExecRegistry::new(ContainerTool::Docker, false).unwrap();
        let workdir = registry.workdir.as_ref().unwrap().path().to_path_buf();
        registry.destroy().await.unwrap();
        assert!(!workdir.exists());

        let err = registry
            .unpack("quay.io/org/bundle:v1", Path::new("/tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnpackError { .. }));
    }
}
