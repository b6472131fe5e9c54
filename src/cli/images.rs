//! `porter images` command implementation

use crate::cli::Context;
use crate::image::oci::ImageReference;
use crate::storage::images::{ImageMetadata, ImageStore};
use clap::Args;

/// Arguments for the `images` command
#[derive(Args)]
pub struct ImagesArgs {
    /// Repository name to filter by
    pub repository: Option<String>,

    /// Only show image IDs
    #[arg(short, long)]
    pub quiet: bool,

    /// Don't truncate output
    #[arg(long)]
    pub no_trunc: bool,
}

/// One line of output: an image under one of its tags
struct Row<'a> {
    repository: String,
    tag: String,
    image: &'a ImageMetadata,
}

/// Execute the `images` command
pub async fn execute(ctx: &Context, args: ImagesArgs) -> anyhow::Result<()> {
    let image_store = ImageStore::new(&ctx.paths)?;
    let images = image_store.list()?;

    let filter = match &args.repository {
        Some(repo) => Some(ImageReference::parse(repo)?.name()),
        None => None,
    };
    let rows: Vec<Row> = images
        .iter()
        .flat_map(rows_for)
        .filter(|row| filter.as_deref().map_or(true, |f| row.repository == f))
        .collect();

    if args.quiet {
        let mut seen = Vec::new();
        for row in rows {
            if !seen.contains(&row.image.id) {
                seen.push(row.image.id.clone());
                println!("{}", short_id(&row.image.id, args.no_trunc));
            }
        }
        return Ok(());
    }

    println!(
        "{:<40} {:<20} {:<20} {:<20} {:<10}",
        "REPOSITORY", "TAG", "IMAGE ID", "CREATED", "SIZE"
    );
    for row in rows {
        println!(
            "{:<40} {:<20} {:<20} {:<20} {:<10}",
            row.repository,
            row.tag,
            short_id(&row.image.id, args.no_trunc),
            format_time_ago(row.image.created),
            format_size(row.image.size)
        );
    }

    Ok(())
}

fn rows_for(image: &ImageMetadata) -> Vec<Row<'_>> {
    if image.repo_tags.is_empty() {
        return vec![Row {
            repository: "<none>".to_string(),
            tag: "<none>".to_string(),
            image,
        }];
    }

    image
        .repo_tags
        .iter()
        .map(|name| {
            let (repository, tag) = name.rsplit_once(':').unwrap_or((name.as_str(), "<none>"));
            Row {
                repository: repository.to_string(),
                tag: tag.to_string(),
                image,
            }
        })
        .collect()
}

/// First 12 characters of an ID, unless `no_trunc` is set
pub(crate) fn short_id(id: &str, no_trunc: bool) -> &str {
    if no_trunc {
        return id;
    }
    id.char_indices().nth(12).map_or(id, |(end, _)| &id[..end])
}

/// Format a timestamp as a human-readable "time ago" string
fn format_time_ago(time: chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let duration = now.signed_duration_since(time);

    if duration.num_days() > 365 {
        format!("{} years ago", duration.num_days() / 365)
    } else if duration.num_days() > 30 {
        format!("{} months ago", duration.num_days() / 30)
    } else if duration.num_days() > 7 {
        format!("{} weeks ago", duration.num_days() / 7)
    } else if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "Less than a minute ago".to_string()
    }
}

/// Format a size in bytes as a human-readable string
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}
