use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const OUTSIDE_TAG: &str = "O";

const TRANSIT_ENTITY_TYPES: [&str; 16] = [
    "FARE",
    "DESTINATION",
    "TRANSPORT",
    "ORIGIN",
    "ROUTE",
    "TIME",
    "COMMUTER",
    "LOCATION",
    "ACTIVITY",
    "PURPOSE",
    "EVENT",
    "SUGGEST",
    "CONDITION",
    "DISTANCE",
    "ATTRACTION",
    "ALTERNATIVE",
];

/// A parsed BIO tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Outside,
    Begin(String),
    Inside(String),
}

impl Tag {
    /// Parses `O`, `B-<TYPE>` or `I-<TYPE>`. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == OUTSIDE_TAG {
            return Some(Self::Outside);
        }
        if let Some(kind) = raw.strip_prefix("B-").filter(|kind| !kind.is_empty()) {
            return Some(Self::Begin(kind.to_string()));
        }
        if let Some(kind) = raw.strip_prefix("I-").filter(|kind| !kind.is_empty()) {
            return Some(Self::Inside(kind.to_string()));
        }
        None
    }

    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::Outside => None,
            Self::Begin(kind) | Self::Inside(kind) => Some(kind),
        }
    }
}

/// Ordered tag set of a token classifier head. Position is the class id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TagVocabulary {
    tags: Vec<String>,
    openers: HashSet<String>,
}

impl TagVocabulary {
    pub fn new(tags: Vec<String>) -> Result<Self, CoreError> {
        if tags.is_empty() {
            return Err(CoreError::InvalidVocabulary("no tags".to_string()));
        }

        let mut seen = HashSet::new();
        let mut openers = HashSet::new();
        let mut continuations = Vec::new();

        for raw in &tags {
            if !seen.insert(raw.as_str()) {
                return Err(CoreError::InvalidVocabulary(format!("duplicate tag {raw}")));
            }
            match Tag::parse(raw) {
                Some(Tag::Outside) => {}
                Some(Tag::Begin(kind)) => {
                    openers.insert(kind);
                }
                Some(Tag::Inside(kind)) => continuations.push(kind),
                None => {
                    return Err(CoreError::InvalidVocabulary(format!(
                        "tag {raw} is not O, B-<TYPE> or I-<TYPE>"
                    )))
                }
            }
        }

        if !seen.contains(OUTSIDE_TAG) {
            return Err(CoreError::InvalidVocabulary(format!(
                "missing {OUTSIDE_TAG} tag"
            )));
        }

        if let Some(orphan) = continuations.iter().find(|kind| !openers.contains(*kind)) {
            return Err(CoreError::InvalidVocabulary(format!(
                "I-{orphan} has no matching B-{orphan}"
            )));
        }

        Ok(Self { tags, openers })
    }

    /// The transit tag set: `O`, B/I pairs for every entity type, and the opener-only `B-DISCOUNT`.
    pub fn transit() -> Self {
        let mut tags = vec![OUTSIDE_TAG.to_string()];
        let mut openers = HashSet::new();
        for kind in TRANSIT_ENTITY_TYPES {
            tags.push(format!("B-{kind}"));
            tags.push(format!("I-{kind}"));
            openers.insert(kind.to_string());
            if kind == "TRANSPORT" {
                tags.push("B-DISCOUNT".to_string());
                openers.insert("DISCOUNT".to_string());
            }
        }

        Self { tags, openers }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|known| known == tag)
    }

    pub fn id_for(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|known| known == tag)
    }

    pub fn tag_for_id(&self, id: usize) -> Option<&str> {
        self.tags.get(id).map(String::as_str)
    }

    /// Interprets a predicted tag. Tags outside the vocabulary, and continuations whose
    /// type has no opener, degrade to `Outside`.
    pub fn resolve(&self, raw: &str) -> Tag {
        if !self.contains(raw) {
            return Tag::Outside;
        }
        match Tag::parse(raw) {
            Some(Tag::Inside(kind)) if !self.openers.contains(&kind) => Tag::Outside,
            Some(tag) => tag,
            None => Tag::Outside,
        }
    }

    /// Picks the highest scoring tag for each row of class scores. Rows whose width does
    /// not match the vocabulary decode as `O`.
    pub fn decode_argmax(&self, rows: &[Vec<f32>]) -> Vec<String> {
        rows.iter()
            .map(|row| {
                if row.len() != self.tags.len() {
                    return OUTSIDE_TAG.to_string();
                }
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .and_then(|(id, _)| self.tag_for_id(id))
                    .unwrap_or(OUTSIDE_TAG)
                    .to_string()
            })
            .collect()
    }
}

impl TryFrom<Vec<String>> for TagVocabulary {
    type Error = CoreError;

    fn try_from(tags: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(tags)
    }
}

impl From<TagVocabulary> for Vec<String> {
    fn from(vocabulary: TagVocabulary) -> Self {
        vocabulary.tags
    }
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self::transit()
    }
}
