//! Multi-factor relevance scoring.
//!
//! An article's score is the sum of three dimensions:
//!
//! | Dimension | Formula |
//! |-----------|---------|
//! | freshness | `max(0, 60 - age_hours * 2)`, zero at 30 hours and beyond |
//! | source weight | `weight * 20` |
//! | keyword boost | `min(15, 3 * keyword_hits)` |
//!
//! Age is measured against a single `now` captured at the start of the run,
//! so the result depends only on the inputs. Every dimension and the total
//! are rounded to 2 decimals independently; the total is summed from the
//! unrounded parts.

use crate::models::{Category, Score};
use crate::utils::round2;
use chrono::{DateTime, Utc};

const FRESHNESS_CEILING: f64 = 60.0;
const FRESHNESS_DECAY_PER_HOUR: f64 = 2.0;
const SOURCE_WEIGHT_FACTOR: f64 = 20.0;
const KEYWORD_HIT_POINTS: f64 = 3.0;
const KEYWORD_BOOST_CAP: f64 = 15.0;

/// Hours between `published_at` and `now`, never negative.
pub fn age_hours(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - published_at).num_milliseconds() as f64;
    (millis / 3_600_000.0).max(0.0)
}

pub fn freshness(age_hours: f64) -> f64 {
    (FRESHNESS_CEILING - age_hours * FRESHNESS_DECAY_PER_HOUR).max(0.0)
}

/// Number of the category's keywords that occur (case-insensitively, as
/// substrings) in `title + " " + summary`. Each keyword counts once.
pub fn keyword_hits(title: &str, summary: &str, category: Category) -> usize {
    let text = format!("{title} {summary}").to_lowercase();
    category
        .keywords()
        .iter()
        .filter(|word| text.contains(*word))
        .count()
}

/// Score one article.
pub fn score_article(
    title: &str,
    summary: &str,
    category: Category,
    published_at: DateTime<Utc>,
    source_weight: f64,
    now: DateTime<Utc>,
) -> Score {
    let freshness_score = freshness(age_hours(published_at, now));
    let source_weight_score = source_weight * SOURCE_WEIGHT_FACTOR;
    let hits = keyword_hits(title, summary, category) as f64;
    let keyword_boost_score = (hits * KEYWORD_HIT_POINTS).min(KEYWORD_BOOST_CAP);
    let score_total = freshness_score + source_weight_score + keyword_boost_score;

    Score {
        freshness_score: round2(freshness_score),
        source_weight_score: round2(source_weight_score),
        keyword_boost_score: round2(keyword_boost_score),
        score_total: round2(score_total),
    }
}
