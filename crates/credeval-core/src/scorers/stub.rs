//! Deterministic scorers for tests and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;

use credeval_types::{CriterionValue, EvaluationItem};

use crate::error::ScoringError;
use crate::scorer::{ScoreOutcome, Scorer};

/// Fixed url → outcome table. Unknown urls fail with `Unscorable`.
#[derive(Default)]
pub struct StaticScorer {
    outcomes: HashMap<String, ScoreOutcome>,
}

impl StaticScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(
        mut self,
        url: impl Into<String>,
        aggregate_score: u8,
        criteria: Vec<CriterionValue>,
    ) -> Self {
        self.outcomes.insert(url.into(), ScoreOutcome { aggregate_score, criteria });
        self
    }
}

#[async_trait]
impl Scorer for StaticScorer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn score(&self, item: &EvaluationItem) -> Result<ScoreOutcome, ScoringError> {
        self.outcomes
            .get(&item.url)
            .cloned()
            .ok_or_else(|| ScoringError::Unscorable(item.url.clone()))
    }
}

/// Scores every item from its own annotations: the expert score when one is
/// present, otherwise a class-typical default. An oracle for smoke-testing
/// the pipeline, not a real scorer.
#[derive(Debug, Default)]
pub struct GroundTruthScorer;

#[async_trait]
impl Scorer for GroundTruthScorer {
    fn name(&self) -> &'static str {
        "ground-truth"
    }

    async fn score(&self, item: &EvaluationItem) -> Result<ScoreOutcome, ScoringError> {
        let fallback = if item.ground_truth_label.is_positive() { 16 } else { 4 };
        Ok(ScoreOutcome {
            aggregate_score: item.ground_truth_score.unwrap_or(fallback),
            criteria: Vec::new(),
        })
    }
}
