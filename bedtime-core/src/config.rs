//! Pipeline configuration.

use crate::completion::{RetryPolicy, StageParams};

/// Environment variable naming a model override.
pub const MODEL_ENV: &str = "BEDTIME_MODEL";

/// Configuration for the story pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Upper bound on judge rounds per cycle.
    pub max_rounds: u32,

    /// A judged score at or above this ends the cycle early.
    pub score_threshold: u8,

    /// Highest score a first draft may receive without the exceptional flag.
    pub round_one_ceiling: u8,

    /// Retry behaviour for every completion call.
    pub retry: RetryPolicy,

    pub analyzer: StageParams,
    pub storyteller: StageParams,
    pub judge: StageParams,
    pub refiner: StageParams,
    pub modifier: StageParams,
    pub choice_proposer: StageParams,
    pub continuation: StageParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_rounds: 5,
            score_threshold: 7,
            round_one_ceiling: 6,
            retry: RetryPolicy::default(),
            analyzer: StageParams::new(0.2, 500),
            storyteller: StageParams::new(0.8, 2000),
            judge: StageParams::new(0.4, 900),
            refiner: StageParams::new(0.7, 2000),
            modifier: StageParams::new(0.7, 2000),
            choice_proposer: StageParams::new(0.5, 250),
            continuation: StageParams::new(0.8, 900),
        }
    }
}

impl PipelineConfig {
    /// Defaults, with the model taken from `BEDTIME_MODEL` when set.
    pub fn from_env() -> Self {
        let model = std::env::var(MODEL_ENV)
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        Self {
            model,
            ..Self::default()
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the round cap. At least one round always runs.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    /// Set the early-stop threshold (clamped to 1..=10).
    pub fn with_score_threshold(mut self, threshold: u8) -> Self {
        self.score_threshold = threshold.clamp(1, 10);
        self
    }

    /// Set the retry policy for completion calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.score_threshold, 7);
        assert_eq!(config.round_one_ceiling, 6);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.analyzer, StageParams::new(0.2, 500));
        assert_eq!(config.judge, StageParams::new(0.4, 900));
    }

    #[test]
    fn test_builders_clamp() {
        let config = PipelineConfig::default()
            .with_max_rounds(0)
            .with_score_threshold(42)
            .with_model("claude-3-5-haiku-20241022");
        assert_eq!(config.max_rounds, 1);
        assert_eq!(config.score_threshold, 10);
        assert_eq!(config.model.as_deref(), Some("claude-3-5-haiku-20241022"));
    }
}
