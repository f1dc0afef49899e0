use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const OOD_INTENT: &str = "ood_intent";
pub const NO_INTENTS: &str = "No intents predicted";
pub const EMPTY_QUERY: &str = "Error: Empty query provided";
pub const NO_INTENT_PREFIX: &str = "No intent predicted for: ";

/// Entity TYPE to the spans decoded for it, in utterance order.
pub type EntityMap = BTreeMap<String, Vec<String>>;

/// Outcome of running one sub-query through the decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IntentDecision {
    Accepted { labels: Vec<String> },
    NoIntent { sub_query: String },
    OutOfDomain,
}

impl IntentDecision {
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Self::OutOfDomain)
    }

    pub fn into_labels(self) -> Vec<String> {
        match self {
            Self::Accepted { labels } => labels,
            Self::NoIntent { sub_query } => vec![format!("{NO_INTENT_PREFIX}{sub_query}")],
            Self::OutOfDomain => vec![OOD_INTENT.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub ood_min_probability: f32,
    pub ood_min_margin: f32,
    pub accept: f32,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            ood_min_probability: 0.30,
            ood_min_margin: 0.10,
            accept: 0.40,
        }
    }
}

/// One sub-word piece produced by the token classifier, with its predicted tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedPiece {
    pub piece: String,
    pub tag: String,
}

impl TaggedPiece {
    pub fn new(piece: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            piece: piece.into(),
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub intents: Vec<String>,
    pub entities: EntityMap,
}

impl QueryResult {
    pub fn empty_query() -> Self {
        Self {
            intents: vec![EMPTY_QUERY.to_string()],
            entities: EntityMap::new(),
        }
    }
}
