//! `declcfg index` subcommands.

use clap::{Args, Subcommand};

use super::{add, inspect};

/// Work with index images and their package configs.
#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub command: IndexCommand,
}

/// Index subcommands.
#[derive(Subcommand)]
pub enum IndexCommand {
    /// Add bundles to the declarative config of their packages
    Add(add::AddArgs),
    /// Unpack the declarative configs stored in an index image
    Inspect(inspect::InspectArgs),
}

/// Dispatch index subcommands.
pub async fn execute(args: IndexArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        IndexCommand::Add(a) => add::execute(a).await,
        IndexCommand::Inspect(a) => inspect::execute(a).await,
    }
}
