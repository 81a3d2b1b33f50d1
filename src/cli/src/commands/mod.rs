//! CLI command definitions and dispatch.

mod add;
mod index;
mod inspect;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use declcfg_core::config::{ContainerTool, RegistryOptions};
use declcfg_core::error::CatalogError;

/// Build and inspect declarative configs of operator catalogs.
#[derive(Parser)]
#[command(name = "declcfg", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, hide = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Work with index images and their package configs
    Index(index::IndexArgs),
}

/// Registry flags shared by the commands that pull images.
#[derive(Args)]
pub struct RegistryFlags {
    /// PEM bundle of extra root certificates for the registry
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Skip TLS certificate verification for the registry
    #[arg(long)]
    pub skip_tls: bool,
}

impl RegistryFlags {
    /// Combine the flags with `DECLCFG_*` environment defaults.
    pub(crate) fn options(
        &self,
        tool: Option<ContainerTool>,
    ) -> Result<RegistryOptions, CatalogError> {
        let mut options = RegistryOptions::from_env()?;
        if let Some(tool) = tool {
            options.tool = tool;
        }
        if let Some(ca_file) = &self.ca_file {
            options.ca_file = Some(ca_file.clone());
        }
        options.skip_tls |= self.skip_tls;
        Ok(options)
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Index(args) => index::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_add() {
        let cli = Cli::try_parse_from([
            "declcfg",
            "index",
            "add",
            "--bundles",
            "quay.io/org/etcd:v1,quay.io/org/etcd:v2",
            "--config-folder",
            "configs",
            "-c",
            "podman",
            "--skip-tls",
        ])
        .unwrap();
        assert!(!cli.debug);
        let Command::Index(args) = cli.command;
        match args.command {
            index::IndexCommand::Add(add) => {
                assert_eq!(add.bundles, vec!["quay.io/org/etcd:v1", "quay.io/org/etcd:v2"]);
                assert_eq!(add.config_folder, PathBuf::from("configs"));
                assert_eq!(add.container_tool, Some(ContainerTool::Podman));
                assert!(add.registry.skip_tls);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_index_inspect() {
        let cli = Cli::try_parse_from([
            "declcfg",
            "--debug",
            "index",
            "inspect",
            "-i",
            "quay.io/org/index:v1",
            "-p",
            "docker",
        ])
        .unwrap();
        assert!(cli.debug);
        let Command::Index(args) = cli.command;
        match args.command {
            index::IndexCommand::Inspect(inspect) => {
                assert_eq!(inspect.image, "quay.io/org/index:v1");
                assert_eq!(inspect.pull_tool, Some(ContainerTool::Docker));
                assert_eq!(inspect.output, PathBuf::from("configs"));
            }
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_tool() {
        let result = Cli::try_parse_from([
            "declcfg",
            "index",
            "inspect",
            "-i",
            "quay.io/org/index:v1",
            "-p",
            "buildah",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_flags_override_defaults() {
        let flags = RegistryFlags {
            ca_file: Some(PathBuf::from("/etc/ca.pem")),
            skip_tls: true,
        };
        let options = flags.options(Some(ContainerTool::Docker)).unwrap();
        assert_eq!(options.tool, ContainerTool::Docker);
        assert_eq!(options.ca_file, Some(PathBuf::from("/etc/ca.pem")));
        assert!(options.skip_tls);
    }
}
