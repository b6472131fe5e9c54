//! `porter push` command implementation

use crate::cli::Context;
use crate::copy::{CopyOptions, LocalCopier};
use crate::events::EventLog;
use crate::push::{PushOptions, Pusher};
use crate::storage::images::ImageStore;
use crate::storage::layers::LayerManager;
use crate::transport::TransportRegistry;
use clap::Args;
use std::fs;
use std::path::PathBuf;

/// Arguments for the `push` command
#[derive(Args)]
pub struct PushArgs {
    /// Image name or ID to push
    pub source: String,

    /// Where to push; defaults to the name the source was found under
    pub destination: Option<String>,

    /// Push all tagged images in the repository
    #[arg(short, long)]
    pub all_tags: bool,

    /// Push layers uncompressed
    #[arg(long)]
    pub no_compress: bool,

    /// Discard any signatures while copying
    #[arg(long)]
    pub remove_signatures: bool,

    /// Write the digest of the pushed manifest to this file
    #[arg(long)]
    pub digestfile: Option<PathBuf>,

    /// Suppress verbose output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `push` command
pub async fn execute(ctx: &Context, args: PushArgs) -> anyhow::Result<()> {
    let store = ImageStore::new(&ctx.paths)?;
    let transports = TransportRegistry::default();
    let copier = LocalCopier::new(&ctx.paths, &ctx.config)?;
    let events = EventLog::new(&ctx.paths);

    let pusher = Pusher::new(&store, &transports, &copier, Some(&events))
        .with_default_transport(ctx.config.default_transport);

    let options = PushOptions {
        all_tags: args.all_tags,
        copy: CopyOptions {
            compress_layers: !args.no_compress,
            remove_signatures: args.remove_signatures,
            quiet: args.quiet,
        },
    };

    let destination = args.destination.as_deref().unwrap_or("");
    let manifest = pusher.push(&args.source, destination, Some(&options)).await?;

    if let Some(manifest) = manifest {
        let digest = LayerManager::compute_digest_bytes(&manifest);
        if let Some(path) = &args.digestfile {
            fs::write(path, &digest)?;
        }
        println!("{}", digest);
    } else if args.digestfile.is_some() {
        tracing::warn!("--digestfile is ignored with --all-tags");
    }

    Ok(())
}
