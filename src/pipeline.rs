//! The fetch orchestrator: one complete run of the pipeline.
//!
//! # Stages
//!
//! 1. **Fetching**: retrieve every source's feed (in list order, optionally
//!    with bounded concurrency) and parse it, capped per source
//! 2. **Dedup**: normalize each dated entry's link and keep the first
//!    article seen for every canonical URL
//! 3. **Scoring**: score all survivors against a single `now`
//! 4. **Ranking**: order by score, then recency
//! 5. **Translation**: annotate titles and summaries, sequentially
//! 6. **Output**: write trends, latest, merged logs and the translation cache
//!
//! A failing source only produces a `failed` log record; the only errors that
//! escape [`run`] are the ones that make output impossible.

use crate::canonical::canonicalize;
use crate::error::{FetchError, PipelineError};
use crate::feed::parse_feed;
use crate::fetcher::FeedClient;
use crate::models::{Article, Category, RawFeedEntry, RunLog, RunStatus, Source, TrendsDocument};
use crate::outputs::DataPaths;
use crate::outputs::json::{read_json_or, write_json_atomic};
use crate::scoring::score_article;
use crate::translate::{TranslationCache, Translator, translate_text};
use crate::utils::sha256_hex;
use chrono::{DateTime, SubsecRound, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Run logs kept across runs.
pub const MAX_LOG_ENTRIES: usize = 500;
/// Articles in the latest view.
pub const LATEST_LIMIT: usize = 200;
pub const DEFAULT_MAX_ITEMS_PER_SOURCE: usize = 30;

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Entries considered per source, in feed order.
    pub max_items_per_source: usize,
    /// Feeds fetched at once. Results are still consumed in source order.
    pub concurrency: usize,
    /// When false, `titleJa`/`summaryJa` copy the originals and the cache is left alone.
    pub translate: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_items_per_source: DEFAULT_MAX_ITEMS_PER_SOURCE,
            concurrency: 1,
            translate: true,
        }
    }
}

/// What a run produced, for the final log line and exit reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub articles: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub translation_fallbacks: usize,
    pub logs: Vec<RunLog>,
}

/// An entry that passed validation, waiting to be scored.
#[derive(Debug, Clone)]
pub struct Candidate {
    source_name: String,
    source_url: String,
    source_feed_url: String,
    category: Category,
    source_weight: f64,
    title: String,
    summary: String,
    url: String,
    canonical_url: String,
    published_at: DateTime<Utc>,
}

impl Candidate {
    fn new(source: &Source, entry: RawFeedEntry, canonical_url: String, published_at: DateTime<Utc>) -> Self {
        Self {
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            source_feed_url: source.feed_url.clone(),
            category: source.category,
            source_weight: source.weight,
            title: entry.title,
            summary: entry.summary,
            url: entry.url,
            canonical_url,
            published_at,
        }
    }

    fn into_article(self, now: DateTime<Utc>) -> Article {
        let score = score_article(
            &self.title,
            &self.summary,
            self.category,
            self.published_at,
            self.source_weight,
            now,
        );
        Article {
            id: sha256_hex(&self.canonical_url),
            hash_title: sha256_hex(self.title.to_lowercase().trim()),
            source_name: self.source_name,
            source_url: self.source_url,
            source_feed_url: self.source_feed_url,
            category: self.category,
            title: self.title,
            summary: self.summary,
            url: self.url,
            canonical_url: self.canonical_url,
            published_at: self.published_at,
            score,
            scored_at: now,
            title_ja: String::new(),
            summary_ja: String::new(),
        }
    }
}

/// Run-wide dedup map: canonical URL → first candidate seen, in insertion order.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
    candidates: Vec<Candidate>,
}

impl DedupSet {
    /// Insert unless the canonical URL is already present. Returns whether it was inserted.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if !self.seen.insert(candidate.canonical_url.clone()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// Feed one source's parsed entries into the dedup set. Returns the number inserted.
///
/// Undated entries and entries whose link canonicalizes to nothing are skipped.
pub fn ingest(source: &Source, entries: Vec<RawFeedEntry>, dedup: &mut DedupSet) -> usize {
    let mut inserted = 0;
    for entry in entries {
        let Some(published_at) = entry.published_at else {
            debug!(source = %source.name, title = %entry.title, "Skipping undated entry");
            continue;
        };
        let canonical = canonicalize(&entry.url);
        if canonical.as_str().is_empty() {
            continue;
        }
        if canonical.is_fallback() {
            debug!(source = %source.name, url = %entry.url, "Link did not parse; using it verbatim");
        }
        if dedup.insert(Candidate::new(source, entry, canonical.into_string(), published_at)) {
            inserted += 1;
        }
    }
    inserted
}

/// Score every candidate against the run's `now`.
pub fn score_all(candidates: Vec<Candidate>, now: DateTime<Utc>) -> Vec<Article> {
    candidates.into_iter().map(|c| c.into_article(now)).collect()
}

/// Order by `scoreTotal` descending, then `publishedAt` descending. Stable.
pub fn rank(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| {
        b.score
            .score_total
            .total_cmp(&a.score.score_total)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
    articles
}

/// The `limit` most recently published articles, newest first.
pub fn latest_view(articles: &[Article], limit: usize) -> Vec<Article> {
    let mut latest = articles.to_vec();
    latest.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    latest.truncate(limit);
    latest
}

/// Append this run's logs and keep only the newest `cap`, oldest first.
pub fn merge_logs(mut previous: Vec<RunLog>, current: Vec<RunLog>, cap: usize) -> Vec<RunLog> {
    previous.extend(current);
    if previous.len() > cap {
        let excess = previous.len() - cap;
        previous.drain(..excess);
    }
    previous
}

/// Result of fetching and parsing one source.
struct Harvest {
    outcome: Result<(u16, Vec<RawFeedEntry>), FetchError>,
    duration_ms: u64,
    fetched_at: DateTime<Utc>,
}

#[instrument(level = "info", skip_all, fields(source = %source.name, category = %source.category, feed_url = %source.feed_url))]
async fn harvest<C: FeedClient>(source: &Source, client: &C, max_items: usize) -> Harvest {
    let started = Instant::now();
    let outcome = client.fetch(&source.feed_url).await.map(|feed| {
        let mut entries = parse_feed(&feed.body);
        entries.truncate(max_items);
        (feed.status, entries)
    });
    Harvest {
        outcome,
        duration_ms: started.elapsed().as_millis() as u64,
        fetched_at: Utc::now().trunc_subsecs(3),
    }
}

/// Turn a harvest into a log record, ingesting its entries on success.
fn record(source: &Source, harvest: Harvest, dedup: &mut DedupSet) -> RunLog {
    let mut log = RunLog {
        source_name: source.name.clone(),
        source_feed_url: source.feed_url.clone(),
        status: RunStatus::Success,
        http_status: None,
        fetched_count: 0,
        inserted_count: 0,
        error_message: None,
        duration_ms: harvest.duration_ms,
        fetched_at: harvest.fetched_at,
    };

    match harvest.outcome {
        Ok((status, entries)) => {
            log.http_status = Some(status);
            log.fetched_count = entries.len();
            log.inserted_count = ingest(source, entries, dedup);
            info!(
                source = %source.name,
                fetched = log.fetched_count,
                inserted = log.inserted_count,
                duration_ms = log.duration_ms,
                "Source processed"
            );
        }
        Err(e) => {
            log.status = RunStatus::Failed;
            log.http_status = e.http_status();
            log.error_message = Some(e.to_string());
            warn!(
                source = %source.name,
                feed_url = %source.feed_url,
                error = %e,
                duration_ms = log.duration_ms,
                "Source failed; continuing"
            );
        }
    }
    log
}

/// Fill `title_ja`/`summary_ja`. Returns how many texts fell back to the original.
async fn annotate_translations<T: Translator>(
    articles: &mut [Article],
    cache: &mut TranslationCache,
    translator: &T,
    enabled: bool,
) -> usize {
    if !enabled {
        for article in articles.iter_mut() {
            article.title_ja = article.title.clone();
            article.summary_ja = article.summary.clone();
        }
        return 0;
    }

    let mut fallbacks = 0;
    for article in articles.iter_mut() {
        let title = translate_text(&article.title, cache, translator).await;
        let summary = translate_text(&article.summary, cache, translator).await;
        fallbacks += usize::from(title.is_fallback()) + usize::from(summary.is_fallback());
        article.title_ja = title.into_text();
        article.summary_ja = summary.into_text();
    }
    fallbacks
}

/// Drive one complete run and persist its outputs under `paths`.
///
/// `now` is the run's fixed reference time: it stamps `generatedAt` and
/// `scoredAt` and anchors every freshness score.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run<C: FeedClient, T: Translator>(
    sources: &[Source],
    client: &C,
    translator: &T,
    paths: &DataPaths,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let now = now.trunc_subsecs(3);
    let mut cache = TranslationCache::load(&paths.translation_cache).await;
    if cache.is_empty() {
        info!("Translation cache is empty; every text will be requested");
    } else {
        info!(entries = cache.len(), "Loaded translation cache");
    }

    // ---- Fetch (ordered, so first-seen-wins holds at any concurrency) ----
    let harvests: Vec<Harvest> = stream::iter(sources)
        .map(|source| harvest(source, client, options.max_items_per_source))
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let mut dedup = DedupSet::default();
    let logs: Vec<RunLog> = sources
        .iter()
        .zip(harvests)
        .map(|(source, harvest)| record(source, harvest, &mut dedup))
        .collect();
    let sources_failed = logs.iter().filter(|l| l.status == RunStatus::Failed).count();
    if dedup.is_empty() {
        warn!(sources = sources.len(), "No dated articles collected from any source");
    } else {
        info!(articles = dedup.len(), failed = sources_failed, "Fetching complete");
    }

    // ---- Score, rank, translate ----
    let mut articles = rank(score_all(dedup.into_candidates(), now));
    let translation_fallbacks =
        annotate_translations(&mut articles, &mut cache, translator, options.translate).await;
    if translation_fallbacks > 0 {
        warn!(count = translation_fallbacks, "Some texts kept their original language");
    }

    // ---- Output ----
    let total = articles.len();
    let latest = TrendsDocument {
        generated_at: now,
        total,
        items: latest_view(&articles, LATEST_LIMIT),
    };
    let trends = TrendsDocument {
        generated_at: now,
        total,
        items: articles,
    };
    let previous_logs: Vec<RunLog> = read_json_or(&paths.logs, Vec::new()).await;
    let merged_logs = merge_logs(previous_logs, logs.clone(), MAX_LOG_ENTRIES);

    write_json_atomic(&paths.trends, &trends).await?;
    write_json_atomic(&paths.latest, &latest).await?;
    write_json_atomic(&paths.logs, &merged_logs).await?;
    if options.translate {
        cache.save(&paths.translation_cache).await?;
    }

    Ok(RunSummary {
        articles: total,
        sources_ok: logs.len() - sources_failed,
        sources_failed,
        translation_fallbacks,
        logs,
    })
}
