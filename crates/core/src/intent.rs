use std::collections::HashSet;

use crate::error::CoreError;
use crate::models::{DecisionThresholds, IntentDecision, NO_INTENTS};

/// Confidence summary of one probability vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceProfile {
    pub max_probability: f32,
    /// Gap between the two largest probabilities; `None` when fewer than two labels exist.
    pub margin: Option<f32>,
}

impl ConfidenceProfile {
    pub fn from_probabilities(probabilities: &[f32]) -> Option<Self> {
        let mut sorted = probabilities.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let max_probability = *sorted.first()?;
        let margin = sorted.get(1).map(|second| max_probability - second);

        Some(Self {
            max_probability,
            margin,
        })
    }

    pub fn is_out_of_domain(&self, thresholds: &DecisionThresholds) -> bool {
        let weak_margin = self
            .margin
            .is_some_and(|margin| margin < thresholds.ood_min_margin);
        self.max_probability < thresholds.ood_min_probability || weak_margin
    }
}

/// Turns one sub-query's per-label probabilities into a decision.
///
/// The out-of-domain gate runs first and pre-empts per-label acceptance. An empty
/// label set has nothing to accept and is treated as out of domain.
pub fn decide_intent(
    sub_query: &str,
    labels: &[String],
    probabilities: &[f32],
    thresholds: &DecisionThresholds,
) -> Result<IntentDecision, CoreError> {
    if labels.len() != probabilities.len() {
        return Err(CoreError::ProbabilityShape {
            expected: labels.len(),
            actual: probabilities.len(),
        });
    }

    let Some(profile) = ConfidenceProfile::from_probabilities(probabilities) else {
        return Ok(IntentDecision::OutOfDomain);
    };

    if profile.is_out_of_domain(thresholds) {
        return Ok(IntentDecision::OutOfDomain);
    }

    let accepted = labels
        .iter()
        .zip(probabilities)
        .filter(|(_, probability)| **probability >= thresholds.accept)
        .map(|(label, _)| label.clone())
        .collect::<Vec<_>>();

    if accepted.is_empty() {
        Ok(IntentDecision::NoIntent {
            sub_query: sub_query.to_string(),
        })
    } else {
        Ok(IntentDecision::Accepted { labels: accepted })
    }
}

/// Flattens decisions in sub-query order and keeps the first occurrence of each label.
pub fn aggregate_intents(decisions: impl IntoIterator<Item = IntentDecision>) -> Vec<String> {
    let intents = dedup_first_seen(
        decisions
            .into_iter()
            .flat_map(IntentDecision::into_labels),
    );

    if intents.is_empty() {
        vec![NO_INTENTS.to_string()]
    } else {
        intents
    }
}

pub fn dedup_first_seen(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
