mod settings;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use commute_core::{
    assemble_result, decide_intent, decode_entities, normalize_utterance, segment_utterance,
    ConfidenceProfile, DecisionThresholds, EntityMap, IntentDecision, QueryResult, TaggedPiece,
};
use commute_ml::{IntentClassifier, MlStack, TokenClassifier};
use commute_observability::AppMetrics;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use settings::PipelineSettings;

/// How one sub-query was classified.
#[derive(Debug, Clone, Serialize)]
pub struct SubQueryTrace {
    pub text: String,
    pub top_label: Option<String>,
    pub max_probability: Option<f32>,
    pub margin: Option<f32>,
    pub decision: IntentDecision,
}

/// Full working of one `understand` call, for debugging and the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryAnalysis {
    pub sub_queries: Vec<SubQueryTrace>,
    pub tokens: Vec<String>,
    pub pieces: Vec<TaggedPiece>,
    pub result: QueryResult,
}

/// Query-understanding entry point over injected, immutable model handles.
///
/// Holds no per-request state, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct QueryPipeline {
    classifier: Arc<dyn IntentClassifier>,
    tagger: Arc<dyn TokenClassifier>,
    thresholds: DecisionThresholds,
    metrics: Arc<AppMetrics>,
}

impl QueryPipeline {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        tagger: Arc<dyn TokenClassifier>,
        thresholds: DecisionThresholds,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            classifier,
            tagger,
            thresholds,
            metrics,
        }
    }

    pub fn from_stack(
        stack: &MlStack,
        thresholds: DecisionThresholds,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self::new(
            stack.classifier.clone(),
            stack.tagger.clone(),
            thresholds,
            metrics,
        )
    }

    /// Loads models per the settings and builds a pipeline around them.
    pub fn load(settings: &PipelineSettings, metrics: Arc<AppMetrics>) -> Result<Self> {
        let stack = MlStack::load(&settings.ml).context("failed to load ml stack")?;
        Ok(Self::from_stack(&stack, settings.thresholds, metrics))
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.model_name()
    }

    pub fn tagger_name(&self) -> &'static str {
        self.tagger.model_name()
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn understand(&self, utterance: &str) -> Result<QueryResult> {
        self.analyze(utterance).map(|analysis| analysis.result)
    }

    #[instrument(skip(self, utterance), fields(chars = utterance.chars().count()))]
    pub fn analyze(&self, utterance: &str) -> Result<QueryAnalysis> {
        let started = Instant::now();
        self.metrics.inc_request();

        let outcome = self.run(utterance);
        match &outcome {
            Ok(_) => self.metrics.observe_latency(started.elapsed()),
            Err(err) => {
                self.metrics.inc_model_failure();
                warn!(error = %format!("{err:#}"), "understand failed");
            }
        }
        outcome
    }

    fn run(&self, utterance: &str) -> Result<QueryAnalysis> {
        let query = utterance.trim();
        if query.is_empty() {
            self.metrics.inc_empty_query();
            debug!("empty query, skipping model calls");
            return Ok(QueryAnalysis {
                result: QueryResult::empty_query(),
                ..QueryAnalysis::default()
            });
        }

        let sub_queries = segment_utterance(query)
            .iter()
            .map(|sub_query| self.decide_sub_query(sub_query))
            .collect::<Result<Vec<_>>>()?;
        self.metrics.add_sub_queries(sub_queries.len());

        let (tokens, pieces, entities) = self.extract_entities(query)?;

        let result = assemble_result(
            sub_queries.iter().map(|trace| trace.decision.clone()),
            entities,
        );

        info!(
            sub_queries = sub_queries.len(),
            intents = ?result.intents,
            entity_types = ?result.entities.keys().collect::<Vec<_>>(),
            "utterance understood"
        );

        Ok(QueryAnalysis {
            sub_queries,
            tokens,
            pieces,
            result,
        })
    }

    fn decide_sub_query(&self, sub_query: &str) -> Result<SubQueryTrace> {
        let probabilities = self.classifier.classify(sub_query).with_context(|| {
            format!(
                "intent classifier {} failed on sub-query {sub_query:?}",
                self.classifier.model_name()
            )
        })?;
        let labels = self.classifier.labels();
        let decision = decide_intent(sub_query, labels, &probabilities, &self.thresholds)?;

        match &decision {
            IntentDecision::OutOfDomain => self.metrics.inc_ood_decision(),
            IntentDecision::NoIntent { .. } => self.metrics.inc_no_intent_decision(),
            IntentDecision::Accepted { .. } => {}
        }

        let profile = ConfidenceProfile::from_probabilities(&probabilities);
        let top_label = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .and_then(|(idx, _)| labels.get(idx).cloned());

        debug!(sub_query, ?decision, ?profile, "sub-query classified");

        Ok(SubQueryTrace {
            text: sub_query.to_string(),
            top_label,
            max_probability: profile.map(|p| p.max_probability),
            margin: profile.and_then(|p| p.margin),
            decision,
        })
    }

    fn extract_entities(&self, query: &str) -> Result<(Vec<String>, Vec<TaggedPiece>, EntityMap)> {
        let tokens = normalize_utterance(query);
        let pieces = self.tagger.tag(&tokens).with_context(|| {
            format!("token classifier {} failed", self.tagger.model_name())
        })?;
        let entities = decode_entities(&pieces, self.tagger.vocabulary());
        Ok((tokens, pieces, entities))
    }
}
