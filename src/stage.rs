use anyhow::{bail, Result};
use tracing::debug;

use crate::classify::Prediction;
use crate::models::FunnelStage;

pub const NEUTRAL_LABEL: &str = "neutral";

/// Pick the operative emotion from a ranked prediction list.
///
/// The GoEmotions-family models over-predict a generic `neutral` class
/// that says nothing about funnel placement. With `suppress_neutral` set,
/// a top-ranked `neutral` is discarded in favor of the runner-up (the
/// classifier is run with top_k=2 in that mode, so a runner-up exists).
pub fn select_emotion(ranked: &[Prediction], suppress_neutral: bool) -> Result<String> {
    let Some(top) = ranked.first() else {
        bail!("classifier returned an empty prediction list");
    };
    if suppress_neutral && top.label == NEUTRAL_LABEL {
        let Some(second) = ranked.get(1) else {
            bail!("neutral suppression needs at least two ranked labels, got one");
        };
        return Ok(second.label.clone());
    }
    Ok(top.label.clone())
}

/// Map an emotion label to its funnel stage.
///
/// | Emotion       | Stage     | Rationale                                 |
/// |---------------|-----------|-------------------------------------------|
/// | curiosity     | Awareness | spark of attention without commitment     |
/// | neutral       | Awareness | baseline mention, passive signal          |
/// | admiration    | Trust     | positive signal of credibility            |
/// | optimism      | Interest  | hopeful engagement, emotional investment  |
/// | excitement    | Interest  | high-energy attention                     |
/// | desire        | Interest  | expressed want or preference              |
/// | anticipation  | Interest  | planning or looking forward to action     |
/// | confusion     | Drop-Off  | uncertainty that hinders progression      |
/// | disapproval   | Drop-Off  | explicit negative sentiment               |
/// | anger         | Drop-Off  | strong disengagement or backlash          |
/// | gratitude     | Advocacy  | endorsement behavior, thankfulness        |
/// | pride         | Advocacy  | expressed ownership or promotion          |
/// | love          | Advocacy  | emotional alignment with brand or idea    |
///
/// Labels outside the table are treated as low-signal engagement and fall
/// back to Awareness rather than failing the run.
pub fn map_emotion_to_stage(emotion: &str) -> FunnelStage {
    match emotion {
        "curiosity" | "neutral" => FunnelStage::Awareness,
        "optimism" | "excitement" | "desire" | "anticipation" => FunnelStage::Interest,
        "admiration" => FunnelStage::Trust,
        "gratitude" | "pride" | "love" => FunnelStage::Advocacy,
        "confusion" | "disapproval" | "anger" => FunnelStage::DropOff,
        other => {
            debug!("Unmapped emotion `{}` - defaulting to Awareness", other);
            FunnelStage::Awareness
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(label: &str, score: f32) -> Prediction {
        Prediction {
            label: label.into(),
            score,
        }
    }

    #[test]
    fn top_label_wins_without_suppression() {
        let ranked = vec![pred("neutral", 0.9), pred("admiration", 0.3)];
        assert_eq!(select_emotion(&ranked, false).unwrap(), "neutral");
    }

    #[test]
    fn suppression_falls_back_to_runner_up() {
        let ranked = vec![pred("neutral", 0.9), pred("admiration", 0.3)];
        assert_eq!(select_emotion(&ranked, true).unwrap(), "admiration");
    }

    #[test]
    fn suppression_keeps_non_neutral_top() {
        let ranked = vec![pred("gratitude", 0.8), pred("neutral", 0.1)];
        assert_eq!(select_emotion(&ranked, true).unwrap(), "gratitude");
    }

    #[test]
    fn empty_prediction_list_is_an_error() {
        assert!(select_emotion(&[], false).is_err());
    }

    #[test]
    fn suppression_with_single_neutral_is_an_error() {
        assert!(select_emotion(&[pred("neutral", 0.99)], true).is_err());
    }

    #[test]
    fn all_thirteen_known_labels_map_per_table() {
        let table = [
            ("curiosity", FunnelStage::Awareness),
            ("neutral", FunnelStage::Awareness),
            ("admiration", FunnelStage::Trust),
            ("optimism", FunnelStage::Interest),
            ("excitement", FunnelStage::Interest),
            ("desire", FunnelStage::Interest),
            ("anticipation", FunnelStage::Interest),
            ("confusion", FunnelStage::DropOff),
            ("disapproval", FunnelStage::DropOff),
            ("anger", FunnelStage::DropOff),
            ("gratitude", FunnelStage::Advocacy),
            ("pride", FunnelStage::Advocacy),
            ("love", FunnelStage::Advocacy),
        ];
        for (emotion, expected) in table {
            assert_eq!(map_emotion_to_stage(emotion), expected, "{}", emotion);
        }
    }

    #[test]
    fn unknown_labels_default_to_awareness() {
        assert_eq!(map_emotion_to_stage("sadness"), FunnelStage::Awareness);
        assert_eq!(map_emotion_to_stage(""), FunnelStage::Awareness);
    }
}
