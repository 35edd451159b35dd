use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{LabeledPost, Post};

/// Reduce a query string to a filename-safe slug: `"trekking poles"` →
/// `"trekkingpoles"`.
pub fn slugify_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

pub fn raw_csv_path(output_dir: &Path, query: &str) -> PathBuf {
    output_dir
        .join("raw")
        .join(format!("bsky_{}.csv", slugify_query(query)))
}

pub fn labeled_csv_path(output_dir: &Path, query: &str) -> PathBuf {
    output_dir
        .join("processed")
        .join(format!("labeled_posts_bsky_{}.csv", slugify_query(query)))
}

/// Load raw posts from a CSV saved by an earlier run.
pub fn load_posts(path: &Path) -> Result<Vec<Post>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening posts CSV {}", path.display()))?;
    let mut posts = Vec::new();
    for record in reader.deserialize() {
        let post: Post = record.with_context(|| format!("parsing a row of {}", path.display()))?;
        posts.push(post);
    }
    info!("Loaded {} posts from {}", posts.len(), path.display());
    Ok(posts)
}

pub fn save_posts(path: &Path, posts: &[Post]) -> Result<PathBuf> {
    write_csv(path, posts)?;
    info!("Saved {} raw posts to {}", posts.len(), path.display());
    Ok(path.to_path_buf())
}

pub fn save_labeled(path: &Path, posts: &[LabeledPost]) -> Result<PathBuf> {
    write_csv(path, posts)?;
    info!("Saved {} labeled posts to {}", posts.len(), path.display());
    Ok(path.to_path_buf())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
