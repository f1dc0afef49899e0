use anyhow::Result;

use crate::embedding::terms;
use crate::{head, IntentClassifier};

const BASE_LOGIT: f32 = -3.0;
const CUE_WEIGHT: f32 = 4.5;

const INTENT_CUES: [(&str, &[&str]); 6] = [
    (
        "get_distance",
        &["how far", "distance", "km", "kilometers", "kilometres", "gaano kalayo"],
    ),
    (
        "get_fare",
        &["fare", "price", "cost", "how much", "magkano", "pesos", "pamasahe", "discount"],
    ),
    (
        "get_location",
        &["where am i", "where is", "nearest", "nearby", "location", "saan"],
    ),
    (
        "get_route",
        &["route", "which jeep", "how do i get", "how to get", "what to ride", "way to", "directions"],
    ),
    (
        "get_travel_time",
        &["how long", "travel time", "minutes", "hours", "eta", "arrive", "gaano katagal"],
    ),
    ("greet", &["hello", "hi", "good morning", "good evening", "kumusta"]),
];

/// Cue-phrase intent model used when no intent dataset is configured.
#[derive(Debug, Clone)]
pub struct KeywordIntentClassifier {
    labels: Vec<String>,
}

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self {
            labels: INTENT_CUES
                .iter()
                .map(|(label, _)| label.to_string())
                .collect(),
        }
    }
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn model_name(&self) -> &'static str {
        "keyword-intent"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, text: &str) -> Result<Vec<f32>> {
        // Padded so cues only match on whole words.
        let padded = format!(" {} ", terms(text).collect::<Vec<_>>().join(" "));

        let logits = INTENT_CUES
            .iter()
            .map(|(_, cues)| {
                let hits = cues
                    .iter()
                    .filter(|cue| padded.contains(&format!(" {cue} ")))
                    .count();
                BASE_LOGIT + CUE_WEIGHT * hits as f32
            })
            .collect::<Vec<_>>();

        head::sigmoid(&logits)
    }
}
