use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::models::{FunnelStage, LabeledPost};

/// Monday of the week the timestamp falls in, as "YYYY-MM-DD".
pub fn week_start(ts: DateTime<Utc>) -> String {
    let date = ts.date_naive();
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    monday.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyStageCount {
    pub week: String,
    pub funnel_stage: FunnelStage,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyConversion {
    pub week: String,
    /// Interest / Awareness
    pub interest_rate: f64,
    /// Trust / Interest
    pub trust_rate: f64,
    /// Advocacy / Trust
    pub advocacy_rate: f64,
}

/// Per-(week, stage) post counts, sorted by week then funnel order.
/// Only observed combinations appear; charting layers fill the gaps.
pub fn weekly_stage_counts(posts: &[LabeledPost]) -> Vec<WeeklyStageCount> {
    let mut counts: BTreeMap<(String, FunnelStage), u64> = BTreeMap::new();
    for post in posts {
        *counts
            .entry((post.week.clone(), post.funnel_stage))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((week, funnel_stage), count)| WeeklyStageCount {
            week,
            funnel_stage,
            count,
        })
        .collect()
}

/// Running totals per stage across weeks, for the cumulative-volume view.
pub fn cumulative_stage_counts(weekly: &[WeeklyStageCount]) -> Vec<WeeklyStageCount> {
    let mut running: BTreeMap<FunnelStage, u64> = BTreeMap::new();
    let mut weeks: Vec<&str> = weekly.iter().map(|w| w.week.as_str()).collect();
    weeks.dedup();

    let mut out = Vec::new();
    for week in weeks {
        for count in weekly.iter().filter(|w| w.week == week) {
            *running.entry(count.funnel_stage).or_insert(0) += count.count;
        }
        // every stage is emitted every week so lines do not reset to zero
        for stage in FunnelStage::ALL {
            out.push(WeeklyStageCount {
                week: week.to_string(),
                funnel_stage: stage,
                count: running.get(&stage).copied().unwrap_or(0),
            });
        }
    }
    out
}

/// Weekly conversion ratios between adjacent funnel stages.
///
/// These are aggregate ratios, not per-user journeys; a week with zero
/// posts in the denominator stage reports a rate of 0 rather than
/// dividing by zero.
pub fn weekly_conversions(posts: &[LabeledPost]) -> Vec<WeeklyConversion> {
    let mut by_week: BTreeMap<&str, BTreeMap<FunnelStage, u64>> = BTreeMap::new();
    for post in posts {
        *by_week
            .entry(post.week.as_str())
            .or_default()
            .entry(post.funnel_stage)
            .or_insert(0) += 1;
    }

    by_week
        .into_iter()
        .map(|(week, counts)| {
            let n = |stage: FunnelStage| counts.get(&stage).copied().unwrap_or(0);
            WeeklyConversion {
                week: week.to_string(),
                interest_rate: ratio(n(FunnelStage::Interest), n(FunnelStage::Awareness)),
                trust_rate: ratio(n(FunnelStage::Trust), n(FunnelStage::Interest)),
                advocacy_rate: ratio(n(FunnelStage::Advocacy), n(FunnelStage::Trust)),
            }
        })
        .collect()
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Write the chart-ready JSON bundle for the dashboard into `out_dir`.
pub fn write_all_viz(out_dir: &Path, query: &str, posts: &[LabeledPost]) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;

    let weekly = weekly_stage_counts(posts);
    write_json(out_dir.join("viz.weekly.json"), &weekly)?;

    let cumulative = cumulative_stage_counts(&weekly);
    write_json(out_dir.join("viz.cumulative.json"), &cumulative)?;

    let conversions = weekly_conversions(posts);
    write_json(out_dir.join("viz.conversions.json"), &conversions)?;

    let mut emotions: Vec<&str> = posts.iter().map(|p| p.emotion.as_str()).collect();
    emotions.sort_unstable();
    emotions.dedup();
    let mut weeks: Vec<&str> = posts.iter().map(|p| p.week.as_str()).collect();
    weeks.sort_unstable();
    weeks.dedup();

    let idx = json!({
        "query": query,
        "version": 1,
        "counts": {
            "posts": posts.len(),
            "weeks": weeks.len(),
            "emotions": emotions.len(),
        },
        "files": [
            "viz.weekly.json",
            "viz.cumulative.json",
            "viz.conversions.json",
        ]
    });
    write_json(out_dir.join("viz.index.json"), &idx)?;

    debug!("Wrote viz bundle to {}", out_dir.display());
    Ok(())
}

fn write_json<P: AsRef<Path>, T: ?Sized + Serialize>(path: P, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_vec_pretty(value)?)
        .map(|_| ())
        .map_err(|e| e.into())
}
