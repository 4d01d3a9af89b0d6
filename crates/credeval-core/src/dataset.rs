use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EvalError;

/// Supplies the raw, not-yet-validated dataset records in order.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Value>, EvalError>;
}

pub struct VecDataSource {
    records: Vec<Value>,
}

impl VecDataSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<Value>, EvalError> {
        Ok(self.records.clone())
    }
}

/// Reads a JSON file containing a top-level array of source records, e.g.
/// `[{"text": ..., "url": ..., "ground_truth_label": "credible", ...}, ...]`.
pub struct JsonDataSource {
    path: PathBuf,
}

impl JsonDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonDataSource {
    async fn load(&self) -> Result<Vec<Value>, EvalError> {
        let content = read_to_string(&self.path).await?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|source| EvalError::DatasetParse { path: self.path.clone(), source })?;
        match value {
            Value::Array(records) => Ok(records),
            _ => Err(EvalError::DatasetShape { path: self.path.clone() }),
        }
    }
}

#[cfg(not(feature = "sync-fs"))]
async fn read_to_string(path: &PathBuf) -> Result<String, EvalError> {
    use tokio::fs;
    fs::read_to_string(path)
        .await
        .map_err(|source| EvalError::DatasetIo { path: path.clone(), source })
}

#[cfg(feature = "sync-fs")]
async fn read_to_string(path: &PathBuf) -> Result<String, EvalError> {
    use std::fs;
    use tokio::task;
    let path_clone = path.clone();
    task::spawn_blocking(move || {
        fs::read_to_string(&path_clone)
            .map_err(|source| EvalError::DatasetIo { path: path_clone.clone(), source })
    })
    .await
    .map_err(|err| EvalError::DatasetIo {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err),
    })?
}
