//! credeval-core: evaluation engine for credibility scoring.
//! Validate a labeled dataset, score it through an injected scorer capability
//! with bounded concurrency, and compute classification, calibration, and
//! per-criterion diagnostics. Threshold sweeps and misclassification queries
//! reuse the scored set without re-scoring.

pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod misclassify;
pub mod runner;
pub mod scorer;
pub mod sweep;
pub mod validate;

pub mod scorers {
    pub mod http;
    pub mod stub;
}

pub use config::EvalConfig;
pub use dataset::{DataSource, JsonDataSource, VecDataSource};
pub use error::{EvalError, ScoringError};
pub use misclassify::find_misclassifications;
pub use runner::{EvalBuilder, Evaluation, EvaluationRun};
pub use scorer::{from_async_fn, ScoreOutcome, Scorer};
pub use scorers::{
    http::HttpScorer,
    stub::{GroundTruthScorer, StaticScorer},
};
pub use sweep::sweep_thresholds;
pub use validate::{parse_items, validate_records, ValidationIssue, ValidationReport};

pub use credeval_types::{
    CalibrationMetrics, ClassificationMetrics, ConfusionMatrix, CriterionSeparation,
    CriterionValue, ErrorCategory, EvaluationItem, EvaluationResult, Label, MetricValue,
    Misclassification, ReliabilityBin, ScoreDistribution, ScoreStats, ScoredItem,
    ScoringFailure, SweepPoint, ThresholdSweepResult, MAX_SCORE,
};
