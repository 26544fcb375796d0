//! Syncing `runtime-config.json`, the UI's topic and exclude-pattern seed.

use crate::error::OutputError;
use crate::models::RuntimeConfigDocument;
use crate::outputs::json::write_json_atomic;
use chrono::{DateTime, SubsecRound, Utc};
use itertools::Itertools;
use std::path::Path;
use tracing::{info, instrument};

pub const DEFAULT_TOPICS: [&str; 7] = [
    "Anthropic",
    "OpenAI",
    "Google",
    "claude",
    "codex",
    "gemini",
    "frontend",
];

/// Split a comma-separated list, trim each value, drop empties and keep the
/// first occurrence of each duplicate.
pub fn normalize_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Topics from `raw`, or [`DEFAULT_TOPICS`] when nothing usable is given.
pub fn topics_or_default(raw: Option<&str>) -> Vec<String> {
    let topics = raw.map(normalize_list).unwrap_or_default();
    if topics.is_empty() {
        DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect()
    } else {
        topics
    }
}

pub fn build_document(
    topics: Option<&str>,
    exclude_patterns: Option<&str>,
    now: DateTime<Utc>,
) -> RuntimeConfigDocument {
    RuntimeConfigDocument {
        generated_at: now.trunc_subsecs(3),
        topics: topics_or_default(topics),
        exclude_patterns: exclude_patterns.map(normalize_list).unwrap_or_default(),
    }
}

/// Write the runtime config document to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn sync(
    path: &Path,
    topics: Option<&str>,
    exclude_patterns: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RuntimeConfigDocument, OutputError> {
    let document = build_document(topics, exclude_patterns, now);
    write_json_atomic(path, &document).await?;
    info!(
        topics = document.topics.len(),
        excludes = document.exclude_patterns.len(),
        "Runtime config synced"
    );
    Ok(document)
}
