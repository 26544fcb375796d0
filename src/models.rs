//! Data models for feed sources, parsed entries, and the published documents.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Source`]: One configured feed, loaded from the sources file
//! - [`Category`]: The closed set of topic categories and their keyword lists
//! - [`RawFeedEntry`]: A single item as it comes out of the feed parser
//! - [`Article`]: A deduplicated, scored and translated item as published
//! - [`RunLog`]: One record per source per run
//! - [`TrendsDocument`] / [`RuntimeConfigDocument`]: The JSON documents the UI reads
//!
//! Field names are serialized in camelCase to match the schema the browser UI
//! already consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured feed source.
///
/// Sources are immutable for the duration of a run. The `weight` is a
/// non-negative multiplier that feeds the source-weight dimension of the
/// score; it defaults to `1.0` when the sources file omits it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Display name, copied into every article and log record.
    pub name: String,
    /// Homepage of the publication.
    #[serde(default)]
    pub url: String,
    /// The RSS or Atom document to fetch.
    pub feed_url: String,
    /// Topic category, which selects the keyword list used for scoring.
    pub category: Category,
    /// Score multiplier for this source.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Topic categories understood by the scorer.
///
/// The set is closed: an unknown category in the sources file is a
/// configuration error rather than a silently unscored source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ai,
    Web,
    Tech,
}

impl Category {
    /// Lower-case keywords whose presence in an article's text boosts its score.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Ai => &["ai", "llm", "gpt", "model", "inference", "agent"],
            Category::Web => &[
                "browser",
                "css",
                "javascript",
                "typescript",
                "web",
                "frontend",
                "api",
            ],
            Category::Tech => &[
                "cloud",
                "chip",
                "startup",
                "security",
                "infrastructure",
                "data",
                "device",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Ai => "ai",
            Category::Web => "web",
            Category::Tech => "tech",
        };
        f.write_str(name)
    }
}

/// An item extracted from a feed, before deduplication.
///
/// Text fields are already entity-decoded, stripped of markup and
/// whitespace-collapsed. `published_at` is `None` when the feed's date
/// could not be parsed; such entries never reach the output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeedEntry {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// The four score dimensions of an article, each rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub freshness_score: f64,
    pub source_weight_score: f64,
    pub keyword_boost_score: f64,
    pub score_total: f64,
}

/// A deduplicated, scored article as written to the trends and latest documents.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// SHA-256 of the canonical URL.
    pub id: String,
    pub source_name: String,
    pub source_url: String,
    pub source_feed_url: String,
    pub category: Category,
    pub title: String,
    pub summary: String,
    /// The link exactly as the feed published it.
    pub url: String,
    /// Dedup key: the link with tracking parameters, fragment and trailing slash removed.
    pub canonical_url: String,
    #[serde(with = "iso8601")]
    pub published_at: DateTime<Utc>,
    /// SHA-256 of the lower-cased, trimmed title. Persisted for schema
    /// compatibility; nothing in the pipeline reads it back.
    pub hash_title: String,
    pub score: Score,
    #[serde(with = "iso8601")]
    pub scored_at: DateTime<Utc>,
    #[serde(default)]
    pub title_ja: String,
    #[serde(default)]
    pub summary_ja: String,
}

/// Outcome of one source's fetch within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Per-source record of a single run, appended to `fetch-logs.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    pub source_name: String,
    pub source_feed_url: String,
    pub status: RunStatus,
    /// Present whenever the server answered, even with a non-2xx status.
    pub http_status: Option<u16>,
    /// Entries parsed from the feed after the per-source cap.
    pub fetched_count: usize,
    /// Entries that made it into the run's dedup set.
    pub inserted_count: usize,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    #[serde(with = "iso8601")]
    pub fetched_at: DateTime<Utc>,
}

/// Shape shared by `trends.json` and `latest.json`.
///
/// `items` defaults to empty when absent so that a hand-trimmed or partially
/// migrated document still loads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsDocument {
    #[serde(with = "iso8601")]
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    #[serde(default)]
    pub items: Vec<Article>,
}

/// `runtime-config.json`, read by the UI to seed its topic filters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfigDocument {
    #[serde(with = "iso8601")]
    pub generated_at: DateTime<Utc>,
    pub topics: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix
/// (`2025-05-06T14:30:00.000Z`), the format the UI's `Date` parsing expects.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_article() -> Article {
        let published = Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap();
        Article {
            id: "abc".to_string(),
            source_name: "Example".to_string(),
            source_url: "https://example.com".to_string(),
            source_feed_url: "https://example.com/feed.xml".to_string(),
            category: Category::Ai,
            title: "New model released".to_string(),
            summary: "An LLM story".to_string(),
            url: "https://example.com/a?utm_source=x".to_string(),
            canonical_url: "https://example.com/a".to_string(),
            published_at: published,
            hash_title: "def".to_string(),
            score: Score {
                freshness_score: 56.5,
                source_weight_score: 20.0,
                keyword_boost_score: 9.0,
                score_total: 85.5,
            },
            scored_at: published,
            title_ja: "新しいモデル".to_string(),
            summary_ja: "LLMの話".to_string(),
        }
    }

    #[test]
    fn test_source_weight_defaults_to_one() {
        let json = r#"{"name":"A","url":"https://a.example","feedUrl":"https://a.example/rss","category":"web"}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.weight, 1.0);
        assert_eq!(source.category, Category::Web);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let json = r#"{"name":"A","feedUrl":"https://a.example/rss","category":"sports"}"#;
        assert!(serde_json::from_str::<Source>(json).is_err());
    }

    #[test]
    fn test_article_serializes_camel_case() {
        let value = serde_json::to_value(sample_article()).unwrap();
        assert_eq!(value["canonicalUrl"], "https://example.com/a");
        assert_eq!(value["publishedAt"], "2025-05-06T14:30:00.000Z");
        assert_eq!(value["score"]["scoreTotal"], 85.5);
        assert_eq!(value["titleJa"], "新しいモデル");
        assert_eq!(value["category"], "ai");
    }

    #[test]
    fn test_trends_document_round_trip() {
        let doc = TrendsDocument {
            generated_at: Utc.with_ymd_and_hms(2025, 5, 6, 15, 0, 0).unwrap(),
            total: 1,
            items: vec![sample_article()],
        };
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: TrendsDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_trends_document_tolerates_missing_items() {
        let json = r#"{"generatedAt":"2025-05-06T15:00:00.000Z","total":0}"#;
        let doc: TrendsDocument = serde_json::from_str(json).unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_run_log_status_serialization() {
        let log = RunLog {
            source_name: "A".to_string(),
            source_feed_url: "https://a.example/rss".to_string(),
            status: RunStatus::Failed,
            http_status: None,
            fetched_count: 0,
            inserted_count: 0,
            error_message: Some("timeout after 20000ms".to_string()),
            duration_ms: 20001,
            fetched_at: Utc.with_ymd_and_hms(2025, 5, 6, 15, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["httpStatus"].is_null());
        let back: RunLog = serde_json::from_value(value).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_category_keywords() {
        assert!(Category::Ai.keywords().contains(&"llm"));
        assert!(Category::Web.keywords().contains(&"frontend"));
        assert_eq!(Category::Tech.to_string(), "tech");
    }
}
