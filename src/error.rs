//! Error types for each stage of the pipeline.
//!
//! Only [`PipelineError`] (and the [`ConfigError`] / [`OutputError`] it wraps)
//! ever aborts a run. [`FetchError`] is recorded in the per-source log and
//! [`TranslateError`] is absorbed into a cached fallback.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the sources file. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read sources file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid sources JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid sources YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("source `{name}`: {reason}")]
    Invalid { name: String, reason: String },
}

/// Why a single source could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("timeout after {millis}ms")]
    Timeout { millis: u128 },

    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a success status but the body never arrived intact.
    #[error("{reason}")]
    Body { status: u16, reason: String },
}

impl FetchError {
    /// The status code to record in the run log, if the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status } | FetchError::Body { status, .. } => Some(*status),
            FetchError::Timeout { .. } | FetchError::Network(_) => None,
        }
    }
}

/// Failure of a single translation request.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(String),

    #[error("translation endpoint returned HTTP {status}")]
    Http { status: u16 },

    #[error("unexpected translation payload: {0}")]
    Payload(String),
}

/// Failure to persist or serialize an output document.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Run-wide failures. Any of these ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
