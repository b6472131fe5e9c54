//! `porter load` command implementation

use crate::cli::Context;
use crate::copy::archive;
use crate::storage::images::ImageStore;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the `load` command
#[derive(Args)]
pub struct LoadArgs {
    /// Read from a docker-archive tarball
    #[arg(short, long)]
    pub input: PathBuf,

    /// Suppress the load output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `load` command
pub async fn execute(ctx: &Context, args: LoadArgs) -> anyhow::Result<()> {
    ctx.paths.ensure_directories()?;

    let image_ids = archive::load_archive(&ctx.paths, &args.input)?;
    if args.quiet {
        return Ok(());
    }

    let store = ImageStore::new(&ctx.paths)?;
    for image_id in image_ids {
        let metadata = store.load_metadata(&image_id)?;
        if metadata.repo_tags.is_empty() {
            println!("Loaded image ID: sha256:{}", image_id);
        }
        for name in &metadata.repo_tags {
            println!("Loaded image: {}", name);
        }
    }

    Ok(())
}
