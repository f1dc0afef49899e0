mod centroid;
mod embedding;
mod head;
mod keyword;
mod lexicon;
mod wordpiece;

#[cfg(feature = "burn-ml")]
mod burn_impl;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use commute_core::{TagVocabulary, TaggedPiece};
use tracing::{info, warn};

pub use centroid::CentroidIntentClassifier;
pub use embedding::{EmbeddingModel, TfIdfEmbeddingModel};
pub use keyword::KeywordIntentClassifier;
pub use lexicon::{Gazetteer, LexiconTokenTagger};
pub use wordpiece::{SubWord, WordPieceSplitter, CLS_PIECE, SEP_PIECE, UNKNOWN_PIECE};

/// Sequence classifier: one independent probability per label, in `labels()` order.
pub trait IntentClassifier: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn labels(&self) -> &[String];
    fn classify(&self, text: &str) -> Result<Vec<f32>>;
}

/// Token classifier over whitespace tokens, returning tagged sub-word pieces.
pub trait TokenClassifier: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn vocabulary(&self) -> &TagVocabulary;
    fn tag(&self, tokens: &[String]) -> Result<Vec<TaggedPiece>>;
}

#[derive(Debug, Clone, Default)]
pub struct MlSettings {
    pub intent_dataset: Option<PathBuf>,
    pub gazetteer: Option<PathBuf>,
    pub wordpiece_vocab: Option<PathBuf>,
}

impl MlSettings {
    pub fn from_env() -> Self {
        Self {
            intent_dataset: env_path("COMMUTE_INTENT_DATASET"),
            gazetteer: env_path("COMMUTE_GAZETTEER"),
            wordpiece_vocab: env_path("COMMUTE_WORDPIECE_VOCAB"),
        }
    }
}

/// Model handles loaded once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct MlStack {
    pub classifier: Arc<dyn IntentClassifier>,
    pub tagger: Arc<dyn TokenClassifier>,
    pub burn_enabled: bool,
}

impl MlStack {
    pub fn load_default() -> Result<Self> {
        Self::load(&MlSettings::from_env())
    }

    /// A missing or unreadable intent dataset falls back to the keyword model. Explicitly
    /// configured tagger resources must load.
    pub fn load(settings: &MlSettings) -> Result<Self> {
        let classifier: Arc<dyn IntentClassifier> = match settings.intent_dataset.as_ref() {
            Some(path) => match CentroidIntentClassifier::from_jsonl(path) {
                Ok(clf) => Arc::new(clf),
                Err(err) => {
                    warn!(
                        dataset = %path.display(),
                        error = %format!("{err:#}"),
                        "intent dataset unusable, falling back to keyword model"
                    );
                    Arc::new(KeywordIntentClassifier::new())
                }
            },
            None => Arc::new(KeywordIntentClassifier::new()),
        };

        let vocabulary = TagVocabulary::transit();
        let gazetteer = match settings.gazetteer.as_ref() {
            Some(path) => Gazetteer::from_json_file(path, &vocabulary)?,
            None => Gazetteer::builtin(&vocabulary)?,
        };
        let splitter = match settings.wordpiece_vocab.as_ref() {
            Some(path) => WordPieceSplitter::from_vocab_file(path)?,
            None => WordPieceSplitter::with_base_vocab(gazetteer.phrases())?,
        };
        info!(
            phrases = gazetteer.len(),
            pieces = splitter.vocab_size(),
            "tagger resources loaded"
        );
        let tagger = Arc::new(LexiconTokenTagger::new(vocabulary, gazetteer, splitter)?);

        let stack = Self {
            classifier,
            tagger,
            burn_enabled: cfg!(feature = "burn-ml"),
        };
        info!(
            classifier = stack.classifier.model_name(),
            labels = stack.classifier.labels().len(),
            tagger = stack.tagger.model_name(),
            burn_enabled = stack.burn_enabled,
            "ml stack loaded"
        );
        Ok(stack)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn default_stack_uses_builtin_models() {
        let stack = MlStack::load(&MlSettings::default()).unwrap();
        assert_eq!(stack.classifier.model_name(), "keyword-intent");
        assert_eq!(stack.tagger.model_name(), "lexicon-tagger");
        assert_eq!(stack.tagger.vocabulary().len(), 34);
    }

    #[test]
    fn missing_dataset_falls_back_to_keywords() {
        let settings = MlSettings {
            intent_dataset: Some(PathBuf::from("/nonexistent/intents.jsonl")),
            ..MlSettings::default()
        };
        let stack = MlStack::load(&settings).unwrap();
        assert_eq!(stack.classifier.model_name(), "keyword-intent");
    }

    #[test]
    fn loads_centroid_model_from_dataset() {
        let path = env::temp_dir().join(format!("commute-intents-{}.jsonl", std::process::id()));
        fs::write(
            &path,
            "{\"text\": \"fare to Cubao\", \"intent\": \"get_fare\"}\n{\"text\": \"how long to Pasay\", \"intent\": \"get_travel_time\"}\n",
        )
        .unwrap();

        let stack = MlStack::load(&MlSettings {
            intent_dataset: Some(path.clone()),
            ..MlSettings::default()
        })
        .unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(stack.classifier.model_name(), "centroid-intent");
        assert_eq!(stack.classifier.labels(), ["get_fare", "get_travel_time"]);
    }

    #[test]
    fn missing_gazetteer_is_an_error() {
        let settings = MlSettings {
            gazetteer: Some(PathBuf::from("/nonexistent/gazetteer.json")),
            ..MlSettings::default()
        };
        assert!(MlStack::load(&settings).is_err());
    }
}
