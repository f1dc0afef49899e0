use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::embedding::{dot, into_unit, EmbeddingModel, TfIdfEmbeddingModel};
use crate::{head, IntentClassifier};

/// Weight of the lead over the best competing label.
const CONTRAST_WEIGHT: f32 = 8.0;
/// Weight of the raw similarity to the label's own centroid.
const SIMILARITY_WEIGHT: f32 = 4.0;
const LOGIT_BIAS: f32 = 2.0;

#[derive(Debug, Deserialize)]
struct LabeledExample {
    text: String,
    intent: String,
}

/// Nearest-centroid intent model fitted from labelled JSONL at load time.
///
/// Each label's logit grows with its similarity to the query and with its lead over the
/// closest competing label, so a query sitting between two centroids scores low on both
/// and text sharing no terms with the dataset scores `sigmoid(-LOGIT_BIAS)` everywhere.
#[derive(Debug, Clone)]
pub struct CentroidIntentClassifier {
    labels: Vec<String>,
    centroids: Vec<Vec<f32>>,
    embedder: TfIdfEmbeddingModel,
}

impl CentroidIntentClassifier {
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading intent dataset at {}", path.display()))?;
        Self::from_jsonl_str(&raw)
    }

    pub fn from_jsonl_str(raw: &str) -> Result<Self> {
        let mut examples = Vec::new();
        for (line_no, line) in raw
            .lines()
            .map(str::trim)
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
        {
            let example: LabeledExample = serde_json::from_str(line)
                .with_context(|| format!("invalid jsonl intent example on line {}", line_no + 1))?;
            if example.intent.trim().is_empty() || example.text.trim().is_empty() {
                continue;
            }
            examples.push(example);
        }

        if examples.is_empty() {
            anyhow::bail!("intent dataset produced zero labels");
        }

        let embedder =
            TfIdfEmbeddingModel::fit(examples.iter().map(|example| example.text.as_str()));

        let mut sums: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        for example in &examples {
            let vector = embedder.embed(&example.text);
            let sum = sums
                .entry(example.intent.trim().to_string())
                .or_insert_with(|| vec![0.0; embedder.dims()]);
            sum.iter_mut()
                .zip(&vector)
                .for_each(|(acc, value)| *acc += value);
        }

        let (labels, centroids) = sums
            .into_iter()
            .map(|(label, sum)| (label, into_unit(sum)))
            .unzip();

        Ok(Self {
            labels,
            centroids,
            embedder,
        })
    }
}

impl IntentClassifier for CentroidIntentClassifier {
    fn model_name(&self) -> &'static str {
        "centroid-intent"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, text: &str) -> Result<Vec<f32>> {
        let query = self.embedder.embed(text);
        let similarities = self
            .centroids
            .iter()
            .map(|center| dot(&query, center))
            .collect::<Vec<_>>();

        let logits = similarities
            .iter()
            .enumerate()
            .map(|(idx, &own)| {
                let rival = similarities
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != idx)
                    .map(|(_, &score)| score)
                    .fold(0.0_f32, f32::max);
                CONTRAST_WEIGHT * (own - rival) + SIMILARITY_WEIGHT * own - LOGIT_BIAS
            })
            .collect::<Vec<_>>();

        head::sigmoid(&logits)
    }
}
