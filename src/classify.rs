use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// One predicted emotion with its confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

/// Multi-label emotion classification over a batch of texts.
///
/// Implementations return one ranked list per input, in input order, each
/// sorted by descending confidence.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>>;
}

/// Classifier backed by a hosted text-classification endpoint
/// (GoEmotions-family model).
///
/// Constructed once per run; the underlying HTTP client reuses its
/// connections across every batch, so the expensive setup is amortized.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    top_k: usize,
}

pub const DEFAULT_MODEL: &str = "SamLowe/roberta-base-go_emotions";

impl HttpClassifier {
    /// `top_k` is 2 when neutral suppression is active (a runner-up label
    /// must be available), 1 otherwise. The API token is read from
    /// `HF_API_TOKEN` when present.
    pub fn new(model: &str, top_k: usize) -> Result<Self> {
        let client = Client::builder().build()?;
        let endpoint = format!("https://api-inference.huggingface.co/models/{}", model);
        let api_token = std::env::var("HF_API_TOKEN").ok();
        Ok(Self {
            client,
            endpoint,
            api_token,
            top_k,
        })
    }
}

#[async_trait]
impl EmotionClassifier for HttpClassifier {
    async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>> {
        let start = std::time::Instant::now();
        debug!("Inference call starting - texts={}", batch.len());

        let mut req = self.client.post(&self.endpoint).json(&json!({
            "inputs": batch,
            "parameters": { "top_k": self.top_k },
        }));
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("inference request failed for a batch of {} texts", batch.len()))?;
        let resp = resp
            .error_for_status()
            .context("inference endpoint returned an error status")?;

        let predictions: Vec<Vec<Prediction>> = resp
            .json()
            .await
            .context("decoding inference response")?;

        if predictions.len() != batch.len() {
            bail!(
                "inference returned {} results for {} inputs",
                predictions.len(),
                batch.len()
            );
        }

        let elapsed = start.elapsed();
        info!(
            "Inference call completed - duration={:.2}s, texts={}",
            elapsed.as_secs_f32(),
            batch.len()
        );

        Ok(predictions)
    }
}
