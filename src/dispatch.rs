use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::classify::{EmotionClassifier, Prediction};

/// Classify every text, batching and dispatching concurrently.
///
/// Texts are split into contiguous chunks of at most `batch_size`, and the
/// chunks run in waves of `concurrency` parallel inference calls. Each wave
/// fully joins before the next starts, and results are reassembled in
/// original input order no matter which call finishes first, so the output
/// is identical to a strictly sequential run.
///
/// A failed chunk aborts the whole run; there is no retry and no partial
/// output. This is an offline batch job, not a live service.
pub async fn classify_all(
    classifier: &dyn EmotionClassifier,
    texts: &[String],
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<Vec<Prediction>>> {
    if texts.is_empty() {
        debug!("No texts to classify");
        return Ok(Vec::new());
    }

    let chunks: Vec<&[String]> = texts.chunks(batch_size.max(1)).collect();
    let total_batches = chunks.len();
    let concurrency = concurrency.max(1);

    info!(
        "Classification starting - texts={}, batches={}, batch_size={}, concurrency={}",
        texts.len(),
        total_batches,
        batch_size,
        concurrency
    );

    let start = std::time::Instant::now();
    let mut predictions: Vec<Vec<Prediction>> = Vec::with_capacity(texts.len());
    let mut total_wave_time = 0.0f32;
    let mut completed = 0usize;

    for (wave_idx, wave) in chunks.chunks(concurrency).enumerate() {
        let wave_start = std::time::Instant::now();

        let tasks: Vec<_> = wave.iter().map(|chunk| classifier.classify(chunk)).collect();
        let results = futures::future::join_all(tasks).await;

        // join_all yields results in submission order, so extending here
        // keeps predictions aligned with the input texts.
        for result in results {
            let batch_preds = result.context("inference failed - aborting without partial output")?;
            predictions.extend(batch_preds);
        }

        completed += wave.len();
        let wave_elapsed = wave_start.elapsed().as_secs_f32();
        total_wave_time += wave_elapsed;

        let pct = (completed as f32 / total_batches as f32 * 100.0) as u32;
        let avg_wave_time = total_wave_time / (wave_idx + 1) as f32;
        let remaining_waves =
            ((total_batches - completed) as f32 / concurrency as f32).ceil() as u32;
        let eta_seconds = avg_wave_time * remaining_waves as f32;

        info!(
            "Classification progress: {}/{} batches ({}%) | wave: {:.1}s | avg wave: {:.1}s | ETA: {}m {}s",
            completed,
            total_batches,
            pct,
            wave_elapsed,
            avg_wave_time,
            (eta_seconds / 60.0) as u32,
            (eta_seconds % 60.0) as u32
        );
    }

    if predictions.len() != texts.len() {
        bail!(
            "classifier produced {} prediction lists for {} texts",
            predictions.len(),
            texts.len()
        );
    }

    let elapsed = start.elapsed();
    info!(
        "Classification completed - duration={:.2}s, texts={}, batches={}",
        elapsed.as_secs_f32(),
        texts.len(),
        total_batches
    );

    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Echoes each input back as its own label, after a per-batch delay
    /// chosen so that later batches often finish before earlier ones.
    struct EchoClassifier;

    #[async_trait]
    impl EmotionClassifier for EchoClassifier {
        async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>> {
            let jitter = batch
                .first()
                .map(|t| t.len() as u64 * 7 % 40)
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(40 - jitter)).await;
            Ok(batch
                .iter()
                .map(|t| {
                    vec![Prediction {
                        label: t.clone(),
                        score: 1.0,
                    }]
                })
                .collect())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl EmotionClassifier for FailingClassifier {
        async fn classify(&self, batch: &[String]) -> Result<Vec<Vec<Prediction>>> {
            if batch.iter().any(|t| t.contains("poison")) {
                return Err(anyhow!("inference backend exploded"));
            }
            Ok(batch
                .iter()
                .map(|t| {
                    vec![Prediction {
                        label: t.clone(),
                        score: 1.0,
                    }]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn preserves_input_order_across_concurrent_batches() {
        let texts: Vec<String> = (0..100).map(|i| format!("t{}", i)).collect();
        let preds = classify_all(&EchoClassifier, &texts, 10, 4).await.unwrap();
        assert_eq!(preds.len(), texts.len());
        for (i, ranked) in preds.iter().enumerate() {
            assert_eq!(ranked[0].label, texts[i]);
        }
    }

    #[tokio::test]
    async fn uneven_final_batch_is_handled() {
        let texts: Vec<String> = (0..23).map(|i| format!("msg {}", i)).collect();
        let preds = classify_all(&EchoClassifier, &texts, 5, 4).await.unwrap();
        assert_eq!(preds.len(), 23);
        assert_eq!(preds[22][0].label, "msg 22");
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let preds = classify_all(&EchoClassifier, &[], 10, 4).await.unwrap();
        assert!(preds.is_empty());
    }

    #[tokio::test]
    async fn failing_batch_aborts_the_run() {
        let mut texts: Vec<String> = (0..30).map(|i| format!("t{}", i)).collect();
        texts[17] = "poison pill".to_string();
        let err = classify_all(&FailingClassifier, &texts, 5, 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inference failed"));
    }
}
