use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationReport;

/// Fatal evaluation errors. Per-item scoring problems are not here; they are
/// collected as [`credeval_types::ScoringFailure`] and reported in the result.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("dataset validation failed with {} error(s)", .0.errors.len())]
    DatasetValidation(ValidationReport),

    #[error("no scoreable items: every item failed scoring")]
    NoScoreableItems,

    /// Internal contract violation. Should never occur on a validated dataset.
    #[error("metrics invariant violated: {0}")]
    MetricsInvariant(String),

    #[error("failed to read dataset {path}: {source}")]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset {path}: {source}")]
    DatasetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset {path}: expected a top-level JSON array of records")]
    DatasetShape { path: PathBuf },

    /// A record deserialized badly after a clean validation report.
    #[error("record {index} failed to deserialize after validation: {source}")]
    RecordDecode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {source}")]
    ConfigParse {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("evaluation builder: {0}")]
    Builder(&'static str),
}

/// Why a single item could not be scored. The orchestrator records these and
/// keeps going; only a run where every item fails is fatal.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scorer endpoint error: {0}")]
    Endpoint(String),

    #[error("malformed scorer response: {0}")]
    MalformedResponse(String),

    #[error("aggregate score {0} outside 0-{max}", max = credeval_types::MAX_SCORE)]
    ScoreOutOfRange(u64),

    #[error("no score available for {0}")]
    Unscorable(String),
}
