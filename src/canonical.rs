//! URL canonicalization for deduplication.
//!
//! Two links that differ only in tracking parameters (`utm_*`, `fbclid`,
//! `gclid`), fragment, or a trailing slash on the path must produce the same
//! key. Canonicalization never fails: a string the URL parser rejects is kept
//! (trimmed) as its own identity and reported as [`CanonicalUrl::Fallback`].

use url::Url;

/// Result of canonicalizing a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalUrl {
    /// The link parsed and was normalized.
    Normalized(String),
    /// The link did not parse; carries the trimmed input unchanged.
    Fallback(String),
}

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        match self {
            CanonicalUrl::Normalized(s) | CanonicalUrl::Fallback(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            CanonicalUrl::Normalized(s) | CanonicalUrl::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CanonicalUrl::Fallback(_))
    }
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || key == "fbclid" || key == "gclid"
}

/// Canonicalize `raw` for use as a dedup key.
///
/// Steps, in order: parse; drop tracking query parameters; clear the
/// fragment; strip one trailing `/` from a path longer than `/`.
pub fn canonicalize(raw: &str) -> CanonicalUrl {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return CanonicalUrl::Fallback(trimmed.to_string());
    };

    strip_tracking_params(&mut url);
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path[..path.len() - 1].to_string();
        url.set_path(&stripped);
    }

    CanonicalUrl::Normalized(url.into())
}

/// Remove tracking parameters. The query is only re-serialized when
/// something was actually removed, so untouched queries keep their encoding.
fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_param(k)).collect();
    if kept.len() == pairs.len() {
        return;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}
