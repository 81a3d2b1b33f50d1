//! `declcfg index add` command.

use std::path::PathBuf;

use clap::Args;
use declcfg_core::config::{AddConfigRequest, ContainerTool};
use declcfg_runtime::ConfigEditor;

use super::RegistryFlags;

#[derive(Args)]
pub struct AddArgs {
    /// Comma separated bundle image references
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub bundles: Vec<String>,

    /// Folder holding one <package>.json per package
    #[arg(long)]
    pub config_folder: PathBuf,

    /// Tool to pull container images. One of: none, docker, podman
    #[arg(short, long)]
    pub container_tool: Option<ContainerTool>,

    #[command(flatten)]
    pub registry: RegistryFlags,
}

pub async fn execute(args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let request = AddConfigRequest {
        bundles: args.bundles,
        config_folder: args.config_folder,
        registry: args.registry.options(args.container_tool)?,
    };

    ConfigEditor::new().add_to_config(&request).await?;

    println!(
        "Added {} bundle(s) to {}",
        request.bundles.len(),
        request.config_folder.display()
    );
    Ok(())
}
