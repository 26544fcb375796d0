//! # Trend Watcher
//!
//! A batch pipeline that collects tech news from configured RSS/Atom feeds,
//! deduplicates it by canonical URL, scores it for relevance, annotates it
//! with Japanese translations and writes static JSON documents for a browser
//! UI to read.
//!
//! ## Features
//!
//! - Fetches RSS 2.0 and Atom feeds with a hard per-request timeout
//! - Deduplicates across sources by normalized URL (tracking params, fragment
//!   and trailing slash removed)
//! - Scores articles by freshness, source weight and category keywords
//! - Translates titles and summaries through a persistent translation cache
//! - Writes every document atomically and keeps a rolling per-source run log
//!
//! ## Usage
//!
//! ```sh
//! trend_watcher fetch --sources config/sources.json --data-dir public/data
//! trend_watcher sync-config --topics "Anthropic, OpenAI"
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: Retrieve and parse each source's feed
//! 2. **Dedup**: Keep the first article seen per canonical URL
//! 3. **Scoring**: Rank survivors against a single reference time
//! 4. **Translation**: Annotate titles and summaries (sequential, cached)
//! 5. **Output**: Write trends, latest, run logs and the translation cache

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod canonical;
mod cli;
mod config;
mod error;
mod feed;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod runtime_config;
mod scoring;
mod translate;
mod utils;

use cli::{Cli, Command, FetchArgs, SyncConfigArgs};
use error::PipelineError;
use fetcher::HttpFeedClient;
use outputs::DataPaths;
use pipeline::{RunOptions, RunSummary};
use translate::{DEFAULT_ENDPOINT, GoogleTranslator};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Environment ---
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("trend_watcher starting up");

    let command = Cli::parse().into_command();
    debug!(?command, "Parsed CLI arguments");

    match command {
        Command::Fetch(args) => {
            let summary = fetch(args).await.inspect_err(|e| {
                error!(error = %e, "Run failed");
            })?;
            info!(
                articles = summary.articles,
                sources_ok = summary.sources_ok,
                sources_failed = summary.sources_failed,
                translation_fallbacks = summary.translation_fallbacks,
                elapsed_secs = start_time.elapsed().as_secs_f64(),
                "Fetch complete"
            );
        }
        Command::SyncConfig(args) => {
            sync_config(args).await.inspect_err(|e| {
                error!(error = %e, "Runtime config sync failed");
            })?;
            info!(
                elapsed_secs = start_time.elapsed().as_secs_f64(),
                "Sync complete"
            );
        }
    }

    Ok(())
}

async fn fetch(args: FetchArgs) -> Result<RunSummary, Box<dyn Error>> {
    // Early check: fail before any network work if the data dir is unusable
    if let Err(e) = ensure_writable_dir(&args.data_dir).await {
        error!(
            path = %args.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let sources = config::load_sources(&args.sources)
        .await
        .map_err(PipelineError::from)?;
    let (client, translator) = build_clients(&args)?;
    let options = RunOptions {
        max_items_per_source: args.max_items_per_source,
        concurrency: usize::from(args.concurrency),
        translate: !args.no_translate,
    };

    let paths = DataPaths::new(&args.data_dir);
    let summary = pipeline::run(&sources, &client, &translator, &paths, &options, Utc::now()).await?;
    Ok(summary)
}

fn build_clients(args: &FetchArgs) -> Result<(HttpFeedClient, GoogleTranslator), PipelineError> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let client = HttpFeedClient::new(timeout)?;
    let endpoint = args
        .translate_endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let translator = GoogleTranslator::with_timeout(endpoint, timeout)?;
    Ok((client, translator))
}

async fn sync_config(args: SyncConfigArgs) -> Result<(), Box<dyn Error>> {
    let paths = DataPaths::new(&args.data_dir);
    runtime_config::sync(
        &paths.runtime_config,
        args.topics.as_deref(),
        args.exclude_patterns.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(())
}
