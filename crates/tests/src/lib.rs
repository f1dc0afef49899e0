//! Shared fixtures for the workspace integration tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use axum::Router;
use commute_api::{build_router, ApiConfig, ApiState};
use commute_core::{DecisionThresholds, TagVocabulary, TaggedPiece};
use commute_ml::{IntentClassifier, LexiconTokenTagger, TokenClassifier};
use commute_observability::AppMetrics;
use commute_pipeline::QueryPipeline;

pub const TEST_API_KEY: &str = "test-commute-key";

/// Intent model whose inference always fails.
pub struct FailingClassifier {
    labels: Vec<String>,
}

impl Default for FailingClassifier {
    fn default() -> Self {
        Self {
            labels: vec!["get_fare".to_string()],
        }
    }
}

impl IntentClassifier for FailingClassifier {
    fn model_name(&self) -> &'static str {
        "failing-intent"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("intent session crashed")
    }
}

/// Token model that tags every piece as outside any entity.
pub struct SilentTagger {
    vocabulary: TagVocabulary,
}

impl Default for SilentTagger {
    fn default() -> Self {
        Self {
            vocabulary: TagVocabulary::transit(),
        }
    }
}

impl TokenClassifier for SilentTagger {
    fn model_name(&self) -> &'static str {
        "silent-tagger"
    }

    fn vocabulary(&self) -> &TagVocabulary {
        &self.vocabulary
    }

    fn tag(&self, tokens: &[String]) -> Result<Vec<TaggedPiece>> {
        Ok(tokens
            .iter()
            .map(|token| TaggedPiece::new(token.as_str(), "O"))
            .collect())
    }
}

pub fn test_config(rate_limit_max: usize) -> ApiConfig {
    ApiConfig {
        api_key: TEST_API_KEY.to_string(),
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max,
    }
}

pub fn router_with(
    classifier: Arc<dyn IntentClassifier>,
    tagger: Arc<dyn TokenClassifier>,
    config: ApiConfig,
) -> Router {
    let pipeline = QueryPipeline::new(
        classifier,
        tagger,
        DecisionThresholds::default(),
        AppMetrics::shared(),
    );
    build_router(ApiState::new(pipeline, config))
}

/// Router over the built-in keyword and lexicon models.
pub fn builtin_router(config: ApiConfig) -> Result<Router> {
    Ok(router_with(
        Arc::new(commute_ml::KeywordIntentClassifier::new()),
        Arc::new(LexiconTokenTagger::builtin()?),
        config,
    ))
}
