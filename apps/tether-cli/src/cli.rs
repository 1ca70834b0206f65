//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tether_core::{Priority, Verb, DEFAULT_MAX_RETRIES};

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Durable offline action queue")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bearer token attached to every replayed call
    #[arg(long, global = true, env = "TETHER_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Queue an arbitrary action
    Enqueue(EnqueueArgs),

    /// Queue a content save (high priority, 5 retries)
    ContentSave {
        /// Content as JSON
        #[arg(long)]
        content: String,

        /// Existing content id; omit to create
        #[arg(long)]
        content_id: Option<String>,
    },

    /// Queue an analytics event (low priority, 2 retries)
    AnalyticsEvent {
        /// Event as JSON
        #[arg(long)]
        event: String,
    },

    /// Queue a user action (medium priority, 3 retries)
    UserAction {
        /// Action as JSON
        #[arg(long)]
        action: String,
    },

    /// Print queue statistics as JSON
    Stats,

    /// Drain the queue now and print the result
    Sync,

    /// Drop every pending action
    Clear,

    /// Keep draining in the background until interrupted
    Run,
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Action kind tag, e.g. "save_content"
    #[arg(long)]
    pub kind: String,

    /// Endpoint path or absolute URL
    #[arg(long)]
    pub target: String,

    #[arg(long, default_value = "POST")]
    pub verb: Verb,

    /// Payload as JSON
    #[arg(long)]
    pub payload: Option<String>,

    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Extra header, repeatable
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
