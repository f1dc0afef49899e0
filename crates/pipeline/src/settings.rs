use std::env;

use commute_core::DecisionThresholds;
use commute_ml::MlSettings;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub thresholds: DecisionThresholds,
    pub ml: MlSettings,
}

impl PipelineSettings {
    pub fn from_env() -> Self {
        let defaults = DecisionThresholds::default();
        Self {
            thresholds: DecisionThresholds {
                ood_min_probability: env_probability(
                    "COMMUTE_OOD_MIN_PROBABILITY",
                    defaults.ood_min_probability,
                ),
                ood_min_margin: env_probability("COMMUTE_OOD_MIN_MARGIN", defaults.ood_min_margin),
                accept: env_probability("COMMUTE_ACCEPT_THRESHOLD", defaults.accept),
            },
            ml: MlSettings::from_env(),
        }
    }
}

fn env_probability(key: &str, default: f32) -> f32 {
    match env::var(key) {
        Ok(raw) => parse_probability(&raw).unwrap_or_else(|| {
            warn!(key, value = %raw, "ignoring threshold override outside [0, 1]");
            default
        }),
        Err(_) => default,
    }
}

fn parse_probability(raw: &str) -> Option<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| (0.0..=1.0).contains(value))
}
