//! `porter events` command implementation

use crate::cli::images::short_id;
use crate::cli::Context;
use crate::events::{Event, EventLog};
use clap::Args;

/// Arguments for the `events` command
#[derive(Args)]
pub struct EventsArgs {
    /// Only show events for this image ID (or ID prefix)
    #[arg(long)]
    pub image: Option<String>,

    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Execute the `events` command
pub async fn execute(ctx: &Context, args: EventsArgs) -> anyhow::Result<()> {
    let log = EventLog::new(&ctx.paths);
    let events: Vec<Event> = log
        .read_all()?
        .into_iter()
        .filter(|e| args.image.as_deref().map_or(true, |id| e.id.starts_with(id)))
        .collect();

    for event in events {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!(
                "{} image {} {} ({})",
                event.time.to_rfc3339(),
                event.kind.as_str(),
                short_id(&event.id, false),
                event.name
            );
        }
    }

    Ok(())
}
