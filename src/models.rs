use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single social-media post as retrieved from a platform.
///
/// `platform` and `language` are filled in by the ingest/normalization
/// stages; everything else comes straight from the platform record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub author_handle: String,
    pub author_display_name: String,
    #[serde(deserialize_with = "de_mixed_utc")]
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub uri: String,
    pub reply_count: Option<u32>,
    pub quote_count: Option<u32>,
    pub repost_count: Option<u32>,
    pub embed_type: Option<String>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub language: String,
}

/// A post after classification: emotion, funnel stage, and the
/// Monday-anchored week it falls into.
///
/// Kept flat (no nesting) so rows serialize cleanly to CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledPost {
    pub author_handle: String,
    pub author_display_name: String,
    #[serde(deserialize_with = "de_mixed_utc")]
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub uri: String,
    pub reply_count: Option<u32>,
    pub quote_count: Option<u32>,
    pub repost_count: Option<u32>,
    pub embed_type: Option<String>,
    pub platform: String,
    pub language: String,
    pub emotion: String,
    pub funnel_stage: FunnelStage,
    pub week: String, // "YYYY-MM-DD", Monday of the post's week
}

impl LabeledPost {
    pub fn from_post(post: Post, emotion: String, funnel_stage: FunnelStage, week: String) -> Self {
        Self {
            author_handle: post.author_handle,
            author_display_name: post.author_display_name,
            created_at: post.created_at,
            text: post.text,
            uri: post.uri,
            reply_count: post.reply_count,
            quote_count: post.quote_count,
            repost_count: post.repost_count,
            embed_type: post.embed_type,
            platform: post.platform,
            language: post.language,
            emotion,
            funnel_stage,
            week,
        }
    }
}

/// Marketing-funnel engagement stage.
///
/// Ordered by funnel progression (Awareness → Interest → Trust → Advocacy);
/// Drop-Off is an absorbing side branch, sorted last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunnelStage {
    Awareness,
    Interest,
    Trust,
    Advocacy,
    #[serde(rename = "Drop-Off")]
    DropOff,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 5] = [
        FunnelStage::Awareness,
        FunnelStage::Interest,
        FunnelStage::Trust,
        FunnelStage::Advocacy,
        FunnelStage::DropOff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Awareness => "Awareness",
            FunnelStage::Interest => "Interest",
            FunnelStage::Trust => "Trust",
            FunnelStage::Advocacy => "Advocacy",
            FunnelStage::DropOff => "Drop-Off",
        }
    }
}

impl std::fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a timestamp in any of the ISO-ish shapes the platforms emit,
/// normalized to UTC. Accepts RFC3339 (with offset or `Z`), naive
/// datetimes with or without fractional seconds, and bare dates.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(anyhow!("unparseable timestamp `{}`", s))
}

fn de_mixed_utc<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
