use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api_types::{ApiPost, ApiSearchPage, ApiSession};
use crate::models::{parse_timestamp, Post};

const SESSION_URL: &str = "https://bsky.social/xrpc/com.atproto.server.createSession";
const SEARCH_URL: &str = "https://bsky.social/xrpc/app.bsky.feed.searchPosts";
const PAGE_LIMIT: usize = 100;

/// Bluesky credentials: handle plus an app password.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub identifier: String,
    pub app_password: String,
}

impl Credentials {
    /// Environment variables (`BSKY_IDENTIFIER`, `BSKY_APP_PASSWORD`) win
    /// over the auth file.
    pub fn resolve(auth_path: &Path) -> Result<Self> {
        if let (Ok(identifier), Ok(app_password)) = (
            std::env::var("BSKY_IDENTIFIER"),
            std::env::var("BSKY_APP_PASSWORD"),
        ) {
            debug!("Using Bluesky credentials from environment");
            return Ok(Self {
                identifier,
                app_password,
            });
        }
        let raw = std::fs::read_to_string(auth_path).with_context(|| {
            format!(
                "no credentials in environment and cannot read auth file {}",
                auth_path.display()
            )
        })?;
        let creds: Credentials = serde_json::from_str(&raw)
            .with_context(|| format!("parsing auth file {}", auth_path.display()))?;
        Ok(creds)
    }
}

/// Authenticate and return a bearer token.
pub async fn create_session(client: &Client, creds: &Credentials) -> Result<String> {
    debug!("Creating Bluesky session for {}", creds.identifier);
    let resp = client
        .post(SESSION_URL)
        .json(&serde_json::json!({
            "identifier": creds.identifier,
            "password": creds.app_password,
        }))
        .send()
        .await
        .context("Bluesky session request failed")?
        .error_for_status()
        .context("Bluesky rejected the credentials")?;
    let session: ApiSession = resp.json().await.context("decoding session response")?;
    Ok(session.access_jwt)
}

/// Collect up to `n_requested` posts matching `keywords`, following the
/// pagination cursor until the API runs dry.
pub async fn search_posts(
    client: &Client,
    access_token: &str,
    keywords: &str,
    n_requested: usize,
) -> Result<Vec<ApiPost>> {
    if n_requested == 0 {
        return Ok(Vec::new());
    }

    let start = std::time::Instant::now();
    let mut posts: Vec<ApiPost> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let limit = PAGE_LIMIT.min(n_requested - posts.len());
        let mut params: Vec<(&str, String)> =
            vec![("q", keywords.to_string()), ("limit", limit.to_string())];
        if let Some(c) = &cursor {
            params.push(("cursor", c.clone()));
        }

        let resp = client
            .get(SEARCH_URL)
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await
            .context("Bluesky search request failed")?
            .error_for_status()
            .context("Bluesky search returned an error status")?;

        let page: ApiSearchPage = resp.json().await.context("decoding search response")?;
        let page_len = page.posts.len();
        posts.extend(page.posts);
        cursor = page.cursor;

        debug!(
            "Search page fetched - page_posts={}, total={}/{}",
            page_len,
            posts.len(),
            n_requested
        );

        if cursor.is_none() || page_len == 0 || posts.len() >= n_requested {
            break;
        }
    }

    posts.truncate(n_requested);
    let elapsed = start.elapsed();
    info!(
        "Post search completed - duration={:.2}s, keywords=\"{}\", posts={}",
        elapsed.as_secs_f32(),
        keywords,
        posts.len()
    );
    Ok(posts)
}

/// Flatten raw API posts into our record shape. Posts without a parseable
/// timestamp are dropped (they cannot be placed in a week); missing text
/// becomes empty and is excluded later by the filters.
pub fn parse_posts(raw: Vec<ApiPost>) -> Vec<Post> {
    let total = raw.len();
    let mut dropped = 0usize;

    let posts: Vec<Post> = raw
        .into_iter()
        .filter_map(|p| {
            let created_at = match p.record.created_at.as_deref().map(parse_timestamp) {
                Some(Ok(dt)) => dt,
                _ => {
                    dropped += 1;
                    return None;
                }
            };
            Some(Post {
                author_handle: p.author.handle,
                author_display_name: p.author.display_name.unwrap_or_default(),
                created_at,
                text: p.record.text.unwrap_or_default(),
                uri: p.uri,
                reply_count: p.reply_count,
                quote_count: p.quote_count,
                repost_count: p.repost_count,
                embed_type: p.embed.and_then(|e| e.embed_type),
                platform: "bluesky".to_string(),
                language: String::new(),
            })
        })
        .collect();

    if dropped > 0 {
        warn!(
            "Dropped {}/{} posts with missing or unparseable timestamps",
            dropped, total
        );
    }
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{ApiAuthor, ApiEmbed, ApiRecord};

    fn api_post(created_at: Option<&str>, text: Option<&str>) -> ApiPost {
        ApiPost {
            uri: "at://did:plc:abc/app.bsky.feed.post/1".into(),
            author: ApiAuthor {
                handle: "user.bsky.social".into(),
                display_name: Some("User One".into()),
            },
            record: ApiRecord {
                created_at: created_at.map(String::from),
                text: text.map(String::from),
            },
            reply_count: Some(2),
            quote_count: Some(1),
            repost_count: Some(0),
            embed: Some(ApiEmbed {
                embed_type: Some("app.bsky.embed.images".into()),
            }),
        }
    }

    #[test]
    fn parses_metadata_fields() {
        let posts = parse_posts(vec![api_post(Some("2025-01-01T10:00:00Z"), Some("Sample text"))]);
        assert_eq!(posts.len(), 1);
        let p = &posts[0];
        assert_eq!(p.author_handle, "user.bsky.social");
        assert_eq!(p.author_display_name, "User One");
        assert_eq!(p.text, "Sample text");
        assert_eq!(p.embed_type.as_deref(), Some("app.bsky.embed.images"));
        assert_eq!(p.platform, "bluesky");
        assert_eq!(p.reply_count, Some(2));
    }

    #[test]
    fn drops_posts_without_timestamps() {
        let posts = parse_posts(vec![
            api_post(None, Some("no date")),
            api_post(Some("garbage"), Some("bad date")),
            api_post(Some("2025-01-01"), Some("ok")),
        ]);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "ok");
    }

    #[test]
    fn missing_text_becomes_empty() {
        let posts = parse_posts(vec![api_post(Some("2025-01-01"), None)]);
        assert_eq!(posts[0].text, "");
    }

    #[test]
    fn session_response_decodes() {
        let session: ApiSession =
            serde_json::from_str(r#"{"accessJwt":"token123","did":"did:plc:x"}"#).unwrap();
        assert_eq!(session.access_jwt, "token123");
    }
}
