use anyhow::{anyhow, bail, Result};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::aggregate::{week_start, write_all_viz};
use crate::classify::{EmotionClassifier, HttpClassifier};
use crate::dispatch::classify_all;
use crate::fetch::{create_session, parse_posts, search_posts, Credentials};
use crate::filter::filter_posts;
use crate::models::{LabeledPost, Post};
use crate::query::Expr;
use crate::stage::{map_emotion_to_stage, select_emotion};
use crate::store;

pub struct RunConfig {
    pub query: String,
    pub input: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub limit: usize,
    pub date_start: String,
    pub date_end: String,
    pub batch_size: usize,
    pub concurrency: usize,
    pub suppress_neutral: bool,
    pub max_text_len: usize,
    pub model: String,
    pub auth: PathBuf,
}

/// Knobs that affect labeling itself, separated from I/O concerns so the
/// labeling stage can be tested with a mock classifier.
pub struct LabelConfig {
    pub query: String,
    pub batch_size: usize,
    pub concurrency: usize,
    pub suppress_neutral: bool,
    pub max_text_len: usize,
}

/// Full batch run: acquire posts, filter, classify, persist, export.
pub async fn run(cfg: RunConfig) -> Result<()> {
    let pipeline_start = std::time::Instant::now();
    info!(
        "Pipeline started - query=\"{}\", date_range={} to {}",
        cfg.query, cfg.date_start, cfg.date_end
    );

    // Parse the query up front; nothing can proceed without a valid
    // expression, and the user should hear about a typo before we spend
    // time on network calls.
    let expr = Expr::parse(&cfg.query)
        .map_err(|e| anyhow!("invalid query `{}`: {}", cfg.query, e))?;

    // 1) acquire raw posts: a previously saved CSV, or a live search
    let posts = match &cfg.input {
        Some(path) => store::load_posts(path)?,
        None => scrape(&cfg, &expr).await?,
    };
    if posts.is_empty() {
        bail!("no posts to analyze for query \"{}\"", cfg.query);
    }

    // 2) time window
    let posts = crate::normalize::filter_by_time(posts, &cfg.date_start, &cfg.date_end)?;

    // 3) URL stripping + language gate
    let posts = crate::normalize::filter_by_language(posts);

    // 4) boolean query filter
    let posts = filter_posts(&expr, posts);
    if posts.is_empty() {
        bail!(
            "no posts matched the query \"{}\" within {} to {}",
            cfg.query,
            cfg.date_start,
            cfg.date_end
        );
    }
    info!("Posts ready for classification - count={}", posts.len());

    // 5) classify and label
    let top_k = if cfg.suppress_neutral { 2 } else { 1 };
    let classifier = HttpClassifier::new(&cfg.model, top_k)?;
    let label_cfg = LabelConfig {
        query: cfg.query.clone(),
        batch_size: cfg.batch_size,
        concurrency: cfg.concurrency,
        suppress_neutral: cfg.suppress_neutral,
        max_text_len: cfg.max_text_len,
    };
    let labeled = label_posts(&classifier, &label_cfg, posts).await?;

    // 6) persist labeled CSV
    let labeled_path = store::labeled_csv_path(&cfg.output_dir, &cfg.query);
    store::save_labeled(&labeled_path, &labeled)?;

    // 7) chart-ready weekly aggregates
    let viz_dir = cfg
        .output_dir
        .join("viz")
        .join(store::slugify_query(&cfg.query));
    write_all_viz(&viz_dir, &cfg.query, &labeled)?;

    let pipeline_elapsed = pipeline_start.elapsed();
    info!(
        "Pipeline completed successfully - total_duration={:.2}s, labeled_posts={}",
        pipeline_elapsed.as_secs_f32(),
        labeled.len()
    );
    Ok(())
}

/// Live Bluesky search, persisted to `<out>/raw/` so the run can be
/// repeated offline with `--input`.
async fn scrape(cfg: &RunConfig, expr: &Expr) -> Result<Vec<Post>> {
    let fetch_start = std::time::Instant::now();

    // The remote search has no boolean semantics; it gets the positive
    // terms as loose keywords and the expression filter enforces the
    // real semantics locally.
    let keywords = expr.positive_terms().join(" ");
    if keywords.is_empty() {
        bail!(
            "query \"{}\" has only negated terms; remote search needs at least one positive term (or use --input)",
            cfg.query
        );
    }

    let creds = Credentials::resolve(&cfg.auth)?;
    let client = Client::builder().build()?;
    let token = create_session(&client, &creds).await?;
    let raw = search_posts(&client, &token, &keywords, cfg.limit).await?;
    let posts = parse_posts(raw);

    let raw_path = store::raw_csv_path(&cfg.output_dir, &cfg.query);
    store::save_posts(&raw_path, &posts)?;

    let elapsed = fetch_start.elapsed();
    info!(
        "Scrape completed - duration={:.2}s, posts={}",
        elapsed.as_secs_f32(),
        posts.len()
    );
    Ok(posts)
}

/// Classify the posts and attach emotion, funnel stage, and week.
///
/// Each text is prefixed with `"Query: {query}. Post: {text}"` before
/// inference. The model scores overall sentiment rather than sentiment
/// toward the query; the prefix at least puts the query in context. The
/// prefixed text is what gets persisted, and the classifier input is
/// additionally hard-truncated at `max_text_len` characters to respect
/// the model's input limit.
pub async fn label_posts(
    classifier: &dyn EmotionClassifier,
    cfg: &LabelConfig,
    posts: Vec<Post>,
) -> Result<Vec<LabeledPost>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let mut posts = posts;
    for post in posts.iter_mut() {
        post.text = format!("Query: {}. Post: {}", cfg.query, post.text);
    }

    let inputs: Vec<String> = posts
        .iter()
        .map(|p| p.text.trim().chars().take(cfg.max_text_len).collect())
        .collect();

    let predictions = classify_all(classifier, &inputs, cfg.batch_size, cfg.concurrency).await?;

    let mut labeled = Vec::with_capacity(posts.len());
    for (post, ranked) in posts.into_iter().zip(predictions) {
        let emotion = select_emotion(&ranked, cfg.suppress_neutral)?;
        let stage = map_emotion_to_stage(&emotion);
        let week = week_start(post.created_at);
        labeled.push(LabeledPost::from_post(post, emotion, stage, week));
    }

    let mut stage_counts: std::collections::BTreeMap<&str, usize> = Default::default();
    for l in &labeled {
        *stage_counts.entry(l.funnel_stage.as_str()).or_insert(0) += 1;
    }
    debug!("Funnel stage distribution: {:?}", stage_counts);
    if labeled.is_empty() {
        warn!("Labeling produced no posts");
    }

    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Prediction;
    use crate::models::{parse_timestamp, FunnelStage};
    use async_trait::async_trait;

    /// Labels every text by a keyword it contains; `neutral` is always the
    /// top prediction so suppression paths get exercised.
    struct KeywordClassifier;

    #[async_trait]
    impl EmotionClassifier for KeywordClassifier {
        async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>> {
            Ok(batch
                .iter()
                .map(|text| {
                    let runner_up = if text.contains("love") {
                        "love"
                    } else if text.contains("broken") {
                        "anger"
                    } else {
                        "curiosity"
                    };
                    vec![
                        Prediction {
                            label: "neutral".into(),
                            score: 0.9,
                        },
                        Prediction {
                            label: runner_up.into(),
                            score: 0.3,
                        },
                    ]
                })
                .collect())
        }
    }

    fn post(text: &str, created_at: &str) -> Post {
        Post {
            author_handle: "user.test".into(),
            author_display_name: "User".into(),
            created_at: parse_timestamp(created_at).unwrap(),
            text: text.into(),
            uri: "at://test".into(),
            reply_count: None,
            quote_count: None,
            repost_count: None,
            embed_type: None,
            platform: "bluesky".into(),
            language: "en".into(),
        }
    }

    fn label_cfg(suppress_neutral: bool) -> LabelConfig {
        LabelConfig {
            query: "trekking poles".into(),
            batch_size: 2,
            concurrency: 4,
            suppress_neutral,
            max_text_len: 512,
        }
    }

    #[tokio::test]
    async fn labels_posts_with_emotion_stage_and_week() {
        let posts = vec![
            post("I love my new trekking poles", "2025-03-14T10:00:00Z"),
            post("my trekking poles arrived broken", "2025-03-18T10:00:00Z"),
        ];
        let labeled = label_posts(&KeywordClassifier, &label_cfg(true), posts)
            .await
            .unwrap();

        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled[0].emotion, "love");
        assert_eq!(labeled[0].funnel_stage, FunnelStage::Advocacy);
        assert_eq!(labeled[0].week, "2025-03-10");
        assert_eq!(labeled[1].emotion, "anger");
        assert_eq!(labeled[1].funnel_stage, FunnelStage::DropOff);
        assert_eq!(labeled[1].week, "2025-03-17");
    }

    #[tokio::test]
    async fn text_is_prefixed_with_query_context() {
        let posts = vec![post("great gear", "2025-03-14")];
        let labeled = label_posts(&KeywordClassifier, &label_cfg(true), posts)
            .await
            .unwrap();
        assert_eq!(
            labeled[0].text,
            "Query: trekking poles. Post: great gear"
        );
    }

    #[tokio::test]
    async fn without_suppression_neutral_wins() {
        let posts = vec![post("I love this", "2025-03-14")];
        let labeled = label_posts(&KeywordClassifier, &label_cfg(false), posts)
            .await
            .unwrap();
        assert_eq!(labeled[0].emotion, "neutral");
        assert_eq!(labeled[0].funnel_stage, FunnelStage::Awareness);
    }

    #[tokio::test]
    async fn classification_input_is_truncated() {
        struct LengthAsserter;
        #[async_trait]
        impl EmotionClassifier for LengthAsserter {
            async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>> {
                for text in batch {
                    assert!(text.chars().count() <= 64);
                }
                Ok(batch
                    .iter()
                    .map(|_| {
                        vec![Prediction {
                            label: "curiosity".into(),
                            score: 0.5,
                        }]
                    })
                    .collect())
            }
        }

        let long_text = "poles ".repeat(100);
        let posts = vec![post(&long_text, "2025-03-14")];
        let cfg = LabelConfig {
            max_text_len: 64,
            suppress_neutral: false,
            ..label_cfg(false)
        };
        let labeled = label_posts(&LengthAsserter, &cfg, posts).await.unwrap();
        // persisted text keeps the full prefixed form, only the
        // classifier input is truncated
        assert!(labeled[0].text.chars().count() > 64);
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let labeled = label_posts(&KeywordClassifier, &label_cfg(true), Vec::new())
            .await
            .unwrap();
        assert!(labeled.is_empty());
    }
}
