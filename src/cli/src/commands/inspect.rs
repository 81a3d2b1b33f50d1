//! `declcfg index inspect` command.

use std::path::PathBuf;

use clap::Args;
use declcfg_core::config::{ContainerTool, InspectIndexRequest, DEFAULT_INSPECT_DIR};
use declcfg_runtime::ConfigEditor;

use super::RegistryFlags;

#[derive(Args)]
pub struct InspectArgs {
    /// Container image of the index to inspect
    #[arg(short, long)]
    pub image: String,

    /// Tool to pull container images. One of: none, docker, podman
    #[arg(short, long)]
    pub pull_tool: Option<ContainerTool>,

    /// Directory to unpack the package configs into
    #[arg(short, long, default_value = DEFAULT_INSPECT_DIR)]
    pub output: PathBuf,

    #[command(flatten)]
    pub registry: RegistryFlags,
}

pub async fn execute(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let request = InspectIndexRequest {
        image: args.image,
        output_dir: args.output,
        registry: args.registry.options(args.pull_tool)?,
    };

    let dir = ConfigEditor::new().inspect_index(&request).await?;

    println!("{}", dir.display());
    Ok(())
}
