//! Command-line interface definitions for Trend Watcher.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be provided via environment variables (or a `.env`
//! file, loaded before parsing).

use crate::fetcher::DEFAULT_TIMEOUT;
use crate::pipeline::DEFAULT_MAX_ITEMS_PER_SOURCE;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Trend Watcher pipeline.
///
/// Running without a subcommand is the same as `fetch`.
///
/// # Examples
///
/// ```sh
/// # One pipeline run with the defaults
/// trend_watcher
///
/// # YAML sources, four feeds fetched at once, no translation
/// trend_watcher fetch --sources config/sources.yaml --concurrency 4 --no-translate
///
/// # Refresh the UI's runtime config
/// trend_watcher sync-config --topics "rust, wasm"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

impl Cli {
    /// The subcommand to run, defaulting to `fetch`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Fetch(self.fetch))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every source and rewrite the data files
    Fetch(FetchArgs),
    /// Write runtime-config.json from the configured topics and exclude patterns
    SyncConfig(SyncConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Sources file (JSON, or YAML by extension)
    #[arg(short, long, env = "TREND_SOURCES", default_value = "config/sources.json")]
    pub sources: PathBuf,

    /// Directory the data files are written to
    #[arg(short, long, env = "TREND_DATA_DIR", default_value = "public/data")]
    pub data_dir: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Entries considered per source
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS_PER_SOURCE)]
    pub max_items_per_source: usize,

    /// Feeds fetched at once
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Translation endpoint (Google `translate_a/single` compatible)
    #[arg(long, env = "TREND_TRANSLATE_ENDPOINT")]
    pub translate_endpoint: Option<String>,

    /// Copy titles and summaries instead of translating them
    #[arg(long)]
    pub no_translate: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SyncConfigArgs {
    /// Comma-separated topics
    #[arg(long, env = "TREND_TOPICS")]
    pub topics: Option<String>,

    /// Comma-separated exclude patterns
    #[arg(long, env = "TREND_EXCLUDE_PATTERNS")]
    pub exclude_patterns: Option<String>,

    /// Directory the data files are written to
    #[arg(short, long, env = "TREND_DATA_DIR", default_value = "public/data")]
    pub data_dir: PathBuf,
}
