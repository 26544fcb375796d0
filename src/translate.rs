//! Japanese translation with a persistent cache.
//!
//! Translation is best-effort. The cache maps the SHA-256 of the trimmed
//! source text to the translated string and is persisted between runs, so a
//! given text hits the network at most once ever: even a failed request
//! stores the (truncated) original as a permanent fallback.
//!
//! # Architecture
//!
//! - [`Translator`]: the network seam, one request per text
//! - [`GoogleTranslator`]: the `translate_a/single` endpoint over `reqwest`
//! - [`TranslationCache`]: the in-memory map, loaded and saved as JSON
//! - [`translate_text`]: the cache-aware entry point used by the pipeline

use crate::error::{OutputError, TranslateError};
use crate::outputs::json::{read_json_or, write_json_atomic};
use crate::utils::{sha256_hex, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Longest text sent to the endpoint, in characters.
pub const MAX_TRANSLATION_CHARS: usize = 450;

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Hiragana, Katakana, CJK Extension A and CJK Unified Ideographs.
static JAPANESE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{3040}-\x{30FF}\x{3400}-\x{4DBF}\x{4E00}-\x{9FFF}]").unwrap());

/// Trait for a single translation request.
///
/// Implementors translate `text` into Japanese. The cache and fallback policy
/// live in [`translate_text`]; implementors only report success or failure.
pub trait Translator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// How a text was resolved.
///
/// The variants let callers (and tests) tell a real translation from a
/// fallback without comparing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Input was empty or whitespace.
    Empty,
    /// Input is already in Japanese; returned unchanged.
    AlreadyTarget(String),
    /// Served from the cache.
    Cached(String),
    /// Freshly translated and cached.
    Translated(String),
    /// The request failed or returned nothing; carries the (truncated)
    /// original, which has been cached in place of a translation.
    Fallback(String),
}

impl Translation {
    pub fn into_text(self) -> String {
        match self {
            Translation::Empty => String::new(),
            Translation::AlreadyTarget(s)
            | Translation::Cached(s)
            | Translation::Translated(s)
            | Translation::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Translation::Fallback(_))
    }
}

/// Text-hash → translated text. Serialized as a flat JSON object with
/// sorted keys so the file diffs cleanly between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TranslationCache {
    entries: BTreeMap<String, String>,
}

impl TranslationCache {
    /// Load the cache from `path`. A missing or corrupt file yields an empty cache.
    pub async fn load(path: &Path) -> Self {
        read_json_or(path, Self::default()).await
    }

    pub async fn save(&self, path: &Path) -> Result<(), OutputError> {
        write_json_atomic(path, self).await
    }

    /// Cached value for `key`. Empty values count as misses.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `text` contains any Japanese script.
pub fn is_japanese(text: &str) -> bool {
    JAPANESE_SCRIPT.is_match(text)
}

/// Cap `text` at [`MAX_TRANSLATION_CHARS`] characters, marking the cut with `...`.
pub fn truncate_for_request(text: &str) -> String {
    if text.chars().count() <= MAX_TRANSLATION_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_TRANSLATION_CHARS).collect();
    short.push_str("...");
    short
}

/// Translate `text`, consulting and updating `cache`.
///
/// Never fails: network and payload errors are logged, and the truncated
/// original is cached and returned as [`Translation::Fallback`].
pub async fn translate_text<T: Translator>(
    text: &str,
    cache: &mut TranslationCache,
    translator: &T,
) -> Translation {
    let raw = text.trim();
    if raw.is_empty() {
        return Translation::Empty;
    }
    if is_japanese(raw) {
        return Translation::AlreadyTarget(raw.to_string());
    }

    let key = sha256_hex(raw);
    if let Some(hit) = cache.get(&key) {
        return Translation::Cached(hit.to_string());
    }

    let short = truncate_for_request(raw);
    match translator.translate(&short).await {
        Ok(translated) => {
            let translated = translated.trim();
            if translated.is_empty() {
                debug!(text = %truncate_for_log(&short, 80), "Empty translation; caching original");
                cache.insert(key, short.clone());
                Translation::Fallback(short)
            } else {
                cache.insert(key, translated.to_string());
                Translation::Translated(translated.to_string())
            }
        }
        Err(e) => {
            warn!(error = %e, text = %truncate_for_log(&short, 80), "Translation failed; caching original");
            cache.insert(key, short.clone());
            Translation::Fallback(short)
        }
    }
}

/// [`Translator`] backed by Google's public `translate_a/single` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Build a translator with its own client and a hard per-request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(crate::fetcher::USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::new(client, endpoint))
    }
}

impl Translator for GoogleTranslator {
    #[instrument(level = "debug", skip_all, fields(chars = text.chars().count()))]
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let url = format!(
            "{}?client=gtx&sl=auto&tl=ja&dt=t&q={}",
            self.endpoint,
            urlencoding::encode(text)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| TranslateError::Payload(e.to_string()))?;
        Ok(join_segments(&payload))
    }
}

/// Concatenate the translated segments of a `translate_a/single` payload.
///
/// The payload looks like `[[["訳1","src1",...],["訳2","src2",...]],...]`;
/// anything that doesn't match yields an empty string.
pub fn join_segments(payload: &Value) -> String {
    payload
        .get(0)
        .and_then(Value::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|segment| segment.get(0).and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
