use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Evaluation settings. Everything the orchestrator tunes is passed in here
/// explicitly; there is no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Score at or above which a source is classified manipulative.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Equal-width reliability bins over [0, 1].
    #[serde(default = "default_calibration_bins")]
    pub calibration_bins: usize,
    /// Scoring calls in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default result cap for misclassification queries.
    #[serde(default = "default_misclassification_limit")]
    pub misclassification_limit: usize,
}

fn default_threshold() -> u8 {
    6
}

fn default_calibration_bins() -> usize {
    10
}

fn default_concurrency() -> usize {
    8
}

fn default_misclassification_limit() -> usize {
    10
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            calibration_bins: default_calibration_bins(),
            concurrency: default_concurrency(),
            misclassification_limit: default_misclassification_limit(),
        }
    }
}

impl EvalConfig {
    /// Load settings from a YAML file. Absent keys fall back to defaults.
    pub async fn from_yaml(path: &Path) -> Result<Self, EvalError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EvalError::ConfigIo { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, EvalError> {
        serde_yaml::from_str(content).map_err(|source| EvalError::ConfigParse { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = EvalConfig::default();
        assert_eq!(config.threshold, 6);
        assert_eq!(config.calibration_bins, 10);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.misclassification_limit, 10);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config = EvalConfig::from_yaml_str("threshold: 10\nconcurrency: 2\n").unwrap();
        assert_eq!(config.threshold, 10);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.calibration_bins, 10);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = EvalConfig::from_yaml_str("threshold: [not a number").unwrap_err();
        assert!(matches!(err, EvalError::ConfigParse { .. }));
    }
}
