//! # Commands
//!
//! ```text
//! commands/
//! ├── mod.rs      ◄─── dispatch
//! ├── enqueue.rs  ◄─── enqueue and the preset shortcuts
//! ├── queue.rs    ◄─── stats, sync, clear
//! └── run.rs      ◄─── long-running host loop
//! ```
//!
//! One-shot commands print JSON on stdout; logs go to stderr.

mod enqueue;
mod queue;
mod run;

use serde::Serialize;
use tether_sync::QueueConfig;

use crate::cli::{Cli, Commands};
use crate::state::open_queue;

pub async fn dispatch(cli: Cli, mut config: QueueConfig) -> anyhow::Result<()> {
    if !matches!(cli.command, Commands::Run) {
        // A one-shot process exits before a background drain could finish.
        config.queue.sync_on_enqueue = false;
    }

    let queue = open_queue(config, cli.auth_token).await?;

    let outcome = match cli.command {
        Commands::Enqueue(args) => enqueue::enqueue(&queue, args).await,
        Commands::ContentSave {
            content,
            content_id,
        } => enqueue::content_save(&queue, &content, content_id.as_deref()).await,
        Commands::AnalyticsEvent { event } => enqueue::analytics_event(&queue, &event).await,
        Commands::UserAction { action } => enqueue::user_action(&queue, &action).await,
        Commands::Stats => queue::stats(&queue).await,
        Commands::Sync => queue::sync(&queue).await,
        Commands::Clear => queue::clear(&queue).await,
        Commands::Run => run::run(&queue).await,
    };

    queue.storage().close().await;
    outcome
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
