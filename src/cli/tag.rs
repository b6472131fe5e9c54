//! `porter tag` command implementation

use crate::cli::Context;
use crate::image::oci::ImageReference;
use crate::storage::images::ImageStore;
use crate::PorterError;
use clap::Args;

/// Arguments for the `tag` command
#[derive(Args)]
pub struct TagArgs {
    /// Source image
    pub source_image: String,

    /// Target names
    #[arg(required = true)]
    pub target_images: Vec<String>,
}

/// Execute the `tag` command
pub async fn execute(ctx: &Context, args: TagArgs) -> anyhow::Result<()> {
    let image_store = ImageStore::new(&ctx.paths)?;

    let image_id = image_store
        .find(&args.source_image)
        .ok_or_else(|| PorterError::ImageNotFound(args.source_image.clone()))?;

    for target in &args.target_images {
        let target_ref = ImageReference::parse_named(target)?;
        image_store.tag(&image_id, &target_ref)?;
    }

    Ok(())
}
