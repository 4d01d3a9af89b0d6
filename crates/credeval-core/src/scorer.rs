use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use credeval_types::{CriterionValue, EvaluationItem};

use crate::error::ScoringError;

/// What the external scorer hands back for one source: the aggregate 0-20
/// manipulation-risk score plus the per-criterion signals behind it.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub aggregate_score: u8,
    pub criteria: Vec<CriterionValue>,
}

/// Capability that scores one source. Implementations must be callable
/// concurrently; retries, rate limiting, and timeouts are theirs to own,
/// surfacing only as a `ScoringError` here.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn score(&self, item: &EvaluationItem) -> Result<ScoreOutcome, ScoringError>;
}

/// Wrap an async closure as a `Scorer`.
pub fn from_async_fn<F, Fut>(name: &'static str, f: F) -> Arc<dyn Scorer>
where
    F: Send + Sync + 'static + Fn(&EvaluationItem) -> Fut,
    Fut: Future<Output = Result<ScoreOutcome, ScoringError>> + Send + 'static,
{
    struct ClosureScorer {
        name: &'static str,
        f: Box<
            dyn Fn(&EvaluationItem) -> BoxFuture<'static, Result<ScoreOutcome, ScoringError>>
                + Send
                + Sync,
        >,
    }

    #[async_trait]
    impl Scorer for ClosureScorer {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn score(&self, item: &EvaluationItem) -> Result<ScoreOutcome, ScoringError> {
            (self.f)(item).await
        }
    }

    Arc::new(ClosureScorer {
        name,
        f: Box::new(move |item| Box::pin(f(item))),
    })
}
