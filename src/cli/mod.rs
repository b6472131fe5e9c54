//! CLI command definitions and handlers

pub mod events;
pub mod images;
pub mod load;
pub mod push;
pub mod tag;

use crate::config::PorterConfig;
use crate::storage::paths::PorterPaths;
use crate::transport::Transport;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Porter - push container images to registries and archives
#[derive(Parser)]
#[command(name = "porter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory of the local image store (default: ~/.porter)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Transport for destinations without a transport prefix
    #[arg(long, global = true)]
    pub default_transport: Option<Transport>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Push an image to a registry, archive or directory
    Push(push::PushArgs),

    /// Create a tag for an image
    Tag(tag::TagArgs),

    /// List images
    Images(images::ImagesArgs),

    /// Load images from a docker-archive tarball
    Load(load::LoadArgs),

    /// Show recorded push events
    Events(events::EventsArgs),
}

/// Store location and settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: PorterPaths,
    pub config: PorterConfig,
}

impl Context {
    /// Resolve the store root and load its config, applying CLI overrides
    pub fn from_cli(cli: &Cli) -> crate::Result<Self> {
        let paths = match &cli.root {
            Some(root) => PorterPaths::with_root(root),
            None => PorterPaths::new()?,
        };
        let mut config = PorterConfig::load(&paths)?;
        if let Some(transport) = cli.default_transport {
            config.default_transport = transport;
        }
        Ok(Self { paths, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_push_with_globals() {
        let cli = Cli::try_parse_from([
            "porter",
            "--default-transport",
            "docker-archive",
            "push",
            "--all-tags",
            "app",
            "quay.io/org/app",
        ])
        .unwrap();

        assert_eq!(cli.default_transport, Some(Transport::DockerArchive));
        match cli.command {
            Commands::Push(args) => {
                assert!(args.all_tags);
                assert_eq!(args.source, "app");
                assert_eq!(args.destination.as_deref(), Some("quay.io/org/app"));
            }
            _ => panic!("expected push"),
        }
    }

    #[test]
    fn test_context_applies_overrides() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["porter", "--root", &root, "--default-transport", "dir", "images"])
            .unwrap();

        let ctx = Context::from_cli(&cli).unwrap();
        assert_eq!(ctx.paths.root(), tmp.path());
        assert_eq!(ctx.config.default_transport, Transport::Dir);
    }
}
