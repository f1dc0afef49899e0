pub mod aggregate;
pub mod bio;
pub mod contraction;
pub mod error;
pub mod intent;
pub mod models;
pub mod segment;
pub mod tags;

pub use aggregate::assemble_result;
pub use bio::{decode_entities, is_special_piece, EntityDecoder};
pub use contraction::{expand_contractions, normalize_utterance};
pub use error::CoreError;
pub use intent::{aggregate_intents, decide_intent, dedup_first_seen, ConfidenceProfile};
pub use models::*;
pub use segment::segment_utterance;
pub use tags::{Tag, TagVocabulary};
