use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid tag vocabulary: {0}")]
    InvalidVocabulary(String),

    #[error("classifier returned {actual} probabilities for {expected} labels")]
    ProbabilityShape { expected: usize, actual: usize },

    #[error("{tokens} tokens were paired with {tags} tags")]
    TagCountMismatch { tokens: usize, tags: usize },
}
