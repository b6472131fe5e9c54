//! Porter CLI entry point
//!
//! Pushes locally stored container images to registries, docker archives
//! and directories.

use clap::Parser;
use porter::cli::{Cli, Commands, Context};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Push(args) => porter::cli::push::execute(&ctx, args).await,
        Commands::Tag(args) => porter::cli::tag::execute(&ctx, args).await,
        Commands::Images(args) => porter::cli::images::execute(&ctx, args).await,
        Commands::Load(args) => porter::cli::load::execute(&ctx, args).await,
        Commands::Events(args) => porter::cli::events::execute(&ctx, args).await,
    }
}
