//! Loading and validating the sources file.
//!
//! The file is a list of [`Source`] records in JSON, or YAML when the path
//! ends in `.yaml`/`.yml`:
//!
//! ```json
//! [
//!   {
//!     "name": "Hacker News",
//!     "url": "https://news.ycombinator.com",
//!     "feedUrl": "https://news.ycombinator.com/rss",
//!     "category": "tech",
//!     "weight": 1.2
//!   }
//! ]
//! ```
//!
//! Unknown categories are rejected by deserialization; weights and feed URLs
//! are checked here. Any problem is fatal for the run.

use crate::error::ConfigError;
use crate::models::Source;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Parse sources from text; `yaml` selects the format.
pub fn parse_sources(text: &str, path: &Path, yaml: bool) -> Result<Vec<Source>, ConfigError> {
    let sources: Vec<Source> = if yaml {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    for source in &sources {
        validate(source)?;
    }
    Ok(sources)
}

fn validate(source: &Source) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: source.name.clone(),
        reason: reason.to_string(),
    };

    if source.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if source.feed_url.trim().is_empty() {
        return Err(invalid("feedUrl is empty"));
    }
    if !source.weight.is_finite() || source.weight < 0.0 {
        return Err(invalid("weight must be a non-negative number"));
    }
    Ok(())
}

/// Read and validate the sources file at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_sources(path: &Path) -> Result<Vec<Source>, ConfigError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let sources = parse_sources(&text, path, is_yaml(path))?;
    info!(count = sources.len(), "Loaded sources");
    Ok(sources)
}
