use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};
use whatlang::{detect, Lang};

use crate::models::Post;

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| Regex::new(r"https?://\S+|www\.\S+").unwrap())
}

/// Remove URLs from post text. Links confuse language detection and carry
/// no sentiment signal.
pub fn strip_urls(text: &str) -> String {
    url_regex().replace_all(text, "").into_owned()
}

/// Best-effort language tag for a post text: `"en"` for English, the
/// detector's three-letter code for other languages, `"na"` when the text
/// is empty or undetectable.
pub fn detect_language(text: &str) -> String {
    if text.trim().is_empty() {
        return "na".to_string();
    }
    match detect(text) {
        Some(info) if info.lang() == Lang::Eng => "en".to_string(),
        Some(info) => info.lang().code().to_string(),
        None => "na".to_string(),
    }
}

/// Strip URLs, tag each post's language, and keep English posts only.
pub fn filter_by_language(posts: Vec<Post>) -> Vec<Post> {
    let total = posts.len();
    let kept: Vec<Post> = posts
        .into_iter()
        .map(|mut p| {
            p.text = strip_urls(&p.text);
            p.language = detect_language(&p.text);
            p
        })
        .filter(|p| p.language == "en")
        .collect();
    info!("Language filter retained {}/{} posts (English only)", kept.len(), total);
    kept
}

/// Keep posts whose `created_at` falls within `[date_start, date_end]`,
/// both inclusive, interpreted as UTC calendar dates.
pub fn filter_by_time(posts: Vec<Post>, date_start: &str, date_end: &str) -> Result<Vec<Post>> {
    let start = parse_date(date_start)?;
    // End bound is exclusive at the following midnight, so the whole end
    // date is covered.
    let end = parse_date(date_end)? + Duration::days(1);

    let total = posts.len();
    let kept: Vec<Post> = posts
        .into_iter()
        .filter(|p| p.created_at >= start && p.created_at < end)
        .collect();
    debug!(
        "Time filter retained {}/{} posts between {} and {}",
        kept.len(),
        total,
        date_start,
        date_end
    );
    Ok(kept)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date `{}` (expected YYYY-MM-DD)", s))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("midnight is always representable")?
        .and_utc())
}
