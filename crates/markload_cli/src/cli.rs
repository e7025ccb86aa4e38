use std::path::PathBuf;

use clap::{Parser, Subcommand};
use markload_core::{ContentKind, ItemId};

use crate::config::DEFAULT_CONFIG_PATH;

/// Queue pages for markdown conversion and collect the results.
#[derive(Debug, Parser)]
#[command(name = "markload", version)]
pub struct Cli {
    /// RON configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue a URL and submit it; unless --no-wait, run until it is delivered
    Add(AddArgs),
    /// Resume in-flight jobs, submit pending items and deliver what finishes
    Run,
    /// Show queued and ready items
    List,
    /// Reset a queue item to pending and run again
    Retry { id: ItemId },
    /// Delete a queue item
    Remove { id: ItemId },
    /// Write one ready item to the output directory
    Deliver { id: ItemId },
    /// Drop a ready item without writing it
    Discard { id: ItemId },
}

#[derive(Debug, clap::Args)]
pub struct AddArgs {
    pub url: String,

    /// article, substack, tweet, pdf, youtube or local-pdf
    #[arg(long)]
    pub kind: Option<ContentKind>,

    /// Output filename; `.md` is appended when missing
    #[arg(long)]
    pub filename: Option<String>,

    /// Captured page HTML to send instead of letting the service fetch it
    #[arg(long, value_name = "PATH")]
    pub html_file: Option<PathBuf>,

    /// Local PDF to upload; implies --kind local-pdf
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Cookie forwarded to the service, repeatable
    #[arg(long = "cookie", value_name = "NAME=VALUE", value_parser = parse_cookie)]
    pub cookies: Vec<(String, String)>,

    /// Return once the request is submitted instead of waiting for the result
    #[arg(long)]
    pub no_wait: bool,
}

fn parse_cookie(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("cookie name missing in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}
