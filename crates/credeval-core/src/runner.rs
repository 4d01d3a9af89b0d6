use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use credeval_types::{
	EvaluationItem, EvaluationResult, ScoredItem, ScoringFailure, MAX_SCORE,
};

use crate::config::EvalConfig;
use crate::dataset::DataSource;
use crate::error::{EvalError, ScoringError};
use crate::metrics;
use crate::scorer::Scorer;
use crate::validate;

pub struct EvalBuilder {
	data_source: Option<Arc<dyn DataSource>>,
	scorer: Option<Arc<dyn Scorer>>,
	config: EvalConfig,
	cancel: Option<Arc<AtomicBool>>,
}

impl EvalBuilder {
	pub fn new() -> Self {
		Self {
			data_source: None,
			scorer: None,
			config: EvalConfig::default(),
			cancel: None,
		}
	}

	pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
		self.data_source = Some(data_source);
		self
	}

	pub fn scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
		self.scorer = Some(scorer);
		self
	}

	pub fn config(mut self, config: EvalConfig) -> Self {
		self.config = config;
		self
	}

	pub fn threshold(mut self, threshold: u8) -> Self {
		self.config.threshold = threshold;
		self
	}

	pub fn concurrency(mut self, n: usize) -> Self {
		self.config.concurrency = n.max(1);
		self
	}

	/// Cooperative cancellation: when the flag flips, no further scoring
	/// calls are dispatched and the partial result is marked incomplete.
	pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
		self.cancel = Some(flag);
		self
	}

	pub fn build(self) -> Result<Evaluation, EvalError> {
		Ok(Evaluation {
			data_source: self.data_source.ok_or(EvalError::Builder("data_source must be set"))?,
			scorer: self.scorer.ok_or(EvalError::Builder("scorer must be set"))?,
			config: self.config,
			cancel: self.cancel,
		})
	}
}

/// A finished run: the assembled metrics plus the scored set, so threshold
/// sweeps and misclassification queries can reuse it without re-scoring.
#[derive(Debug)]
pub struct EvaluationRun {
	pub scored: Vec<ScoredItem>,
	pub result: EvaluationResult,
}

pub struct Evaluation {
	data_source: Arc<dyn DataSource>,
	scorer: Arc<dyn Scorer>,
	config: EvalConfig,
	cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Evaluation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Evaluation")
			.field("scorer", &self.scorer.name())
			.field("config", &self.config)
			.field("cancel", &self.cancel)
			.finish()
	}
}

enum ItemOutcome {
	Scored(ScoredItem),
	Failed(ScoringFailure),
	Skipped,
}

impl Evaluation {
	pub fn builder() -> EvalBuilder {
		EvalBuilder::new()
	}

	pub async fn run(&self) -> Result<EvaluationRun, EvalError> {
		let records = self.data_source.load().await?;
		let items = validate::parse_items(&records)?;
		info!(
			"Scoring {} sources with scorer '{}' (concurrency {})",
			items.len(),
			self.scorer.name(),
			self.config.concurrency.max(1)
		);

		let (scored, failures, incomplete) = self.score_items(items).await;
		if scored.is_empty() && !incomplete {
			return Err(EvalError::NoScoreableItems);
		}

		let result = self.assemble(&scored, failures, incomplete)?;
		Ok(EvaluationRun { scored, result })
	}

	async fn score_items(
		&self,
		items: Vec<EvaluationItem>,
	) -> (Vec<ScoredItem>, Vec<ScoringFailure>, bool) {
		let scorer = self.scorer.clone();
		let cancel = self.cancel.clone();

		let stream = stream::iter(items.into_iter().enumerate()).map(move |(index, item)| {
			let scorer = scorer.clone();
			let cancel = cancel.clone();
			async move {
				if let Some(flag) = &cancel {
					if flag.load(Ordering::SeqCst) {
						return ItemOutcome::Skipped;
					}
				}
				match scorer.score(&item).await {
					Ok(outcome) if outcome.aggregate_score <= MAX_SCORE => {
						ItemOutcome::Scored(ScoredItem {
							index,
							item,
							predicted_score: outcome.aggregate_score,
							criteria: outcome.criteria,
						})
					}
					Ok(outcome) => {
						let err = ScoringError::ScoreOutOfRange(u64::from(outcome.aggregate_score));
						warn!("Scoring failed for item {}: {}", index, err);
						ItemOutcome::Failed(ScoringFailure {
							index,
							url: item.url.clone(),
							reason: err.to_string(),
						})
					}
					Err(err) => {
						warn!("Scoring failed for item {}: {}", index, err);
						ItemOutcome::Failed(ScoringFailure {
							index,
							url: item.url.clone(),
							reason: err.to_string(),
						})
					}
				}
			}
		});

		let outcomes: Vec<ItemOutcome> = stream
			.buffer_unordered(self.config.concurrency.max(1))
			.collect()
			.await;

		let mut scored = Vec::new();
		let mut failures = Vec::new();
		let mut skipped = 0usize;
		for outcome in outcomes {
			match outcome {
				ItemOutcome::Scored(item) => scored.push(item),
				ItemOutcome::Failed(failure) => failures.push(failure),
				ItemOutcome::Skipped => skipped += 1,
			}
		}

		// buffer_unordered completes out of order; restore dataset order.
		scored.sort_by_key(|s| s.index);
		failures.sort_by_key(|f| f.index);

		(scored, failures, skipped > 0)
	}

	fn assemble(
		&self,
		scored: &[ScoredItem],
		failures: Vec<ScoringFailure>,
		incomplete: bool,
	) -> Result<EvaluationResult, EvalError> {
		let pairs = metrics::label_score_pairs(scored);
		let confusion_matrix = metrics::confusion_matrix(&pairs, self.config.threshold);
		metrics::check_invariant(&confusion_matrix, scored.len())?;

		info!(
			"Scored {} sources ({} failures) at threshold {}",
			scored.len(),
			failures.len(),
			self.config.threshold
		);

		Ok(EvaluationResult {
			classification_metrics: metrics::classification_metrics(&confusion_matrix),
			calibration_metrics: metrics::calibration_metrics(&pairs, self.config.calibration_bins),
			confusion_matrix,
			per_criterion_metrics: metrics::criterion_separations(scored),
			score_distribution: metrics::score_distribution(&pairs),
			threshold_used: self.config.threshold,
			scored_count: scored.len(),
			failure_count: failures.len(),
			failures,
			incomplete,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	use serde_json::{json, Value};

	use crate::dataset::VecDataSource;
	use crate::scorer::{from_async_fn, ScoreOutcome};
	use crate::scorers::stub::StaticScorer;

	fn record(url: &str, label: &str) -> Value {
		json!({
			"text": "a".repeat(80),
			"url": url,
			"title": format!("Title for {url}"),
			"ground_truth_label": label,
			"source_dataset": "unit",
			"metadata": {},
			"added_at": "2026-01-01T00:00:00",
		})
	}

	fn fixture() -> (Vec<Value>, StaticScorer) {
		let mut records = Vec::new();
		let mut scorer = StaticScorer::new();
		for (i, score) in [18u8, 16, 14, 12, 9].into_iter().enumerate() {
			let url = format!("https://m/{i}");
			records.push(record(&url, "manipulative"));
			scorer = scorer.with_outcome(&url, score, Vec::new());
		}
		for (i, score) in [1u8, 3, 4, 7, 11].into_iter().enumerate() {
			let url = format!("https://c/{i}");
			records.push(record(&url, "credible"));
			scorer = scorer.with_outcome(&url, score, Vec::new());
		}
		(records, scorer)
	}

	#[tokio::test]
	async fn fixture_run_matches_expected_metrics() {
		let (records, scorer) = fixture();
		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.scorer(Arc::new(scorer))
			.build()
			.unwrap();

		let run = eval.run().await.unwrap();
		assert_eq!(run.result.threshold_used, 6);
		assert_eq!(run.result.scored_count, 10);
		assert_eq!(run.result.failure_count, 0);
		assert!(!run.result.incomplete);
		assert_eq!(run.result.confusion_matrix.true_positives, 5);
		assert_eq!(run.result.confusion_matrix.false_positives, 2);
		assert!((run.result.classification_metrics.precision.value - 5.0 / 7.0).abs() < 1e-9);
		assert!((run.result.classification_metrics.recall.value - 1.0).abs() < 1e-9);

		// Scored set comes back in dataset order despite unordered scoring.
		let indices: Vec<usize> = run.scored.iter().map(|s| s.index).collect();
		assert_eq!(indices, (0..10).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn failed_items_are_collected_and_excluded_from_denominators() {
		let (mut records, scorer) = fixture();
		records.push(record("https://nowhere/0", "credible"));

		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.scorer(Arc::new(scorer))
			.build()
			.unwrap();

		let run = eval.run().await.unwrap();
		assert_eq!(run.result.scored_count, 10);
		assert_eq!(run.result.failure_count, 1);
		assert_eq!(run.result.failures[0].index, 10);
		assert_eq!(run.result.confusion_matrix.total(), 10);
	}

	#[tokio::test]
	async fn run_with_no_scoreable_items_is_fatal() {
		let (records, _) = fixture();
		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.scorer(Arc::new(StaticScorer::new()))
			.build()
			.unwrap();

		let err = eval.run().await.unwrap_err();
		assert!(matches!(err, EvalError::NoScoreableItems));
	}

	#[tokio::test]
	async fn invalid_dataset_aborts_before_any_scoring() {
		let mut bad = record("https://m/0", "manipulative");
		bad["text"] = json!("too short");

		let calls = Arc::new(AtomicUsize::new(0));
		let calls_seen = calls.clone();
		let scorer = from_async_fn("counting", move |_item| {
			let calls = calls_seen.clone();
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(ScoreOutcome { aggregate_score: 0, criteria: Vec::new() })
			}
		});

		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(vec![bad])))
			.scorer(scorer)
			.build()
			.unwrap();

		let err = eval.run().await.unwrap_err();
		match err {
			EvalError::DatasetValidation(report) => {
				assert_eq!(report.errors[0].index, 0);
				assert_eq!(report.errors[0].field, "text");
			}
			other => panic!("expected DatasetValidation, got {other}"),
		}
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn out_of_range_scorer_output_becomes_a_failure() {
		let (mut records, scorer) = fixture();
		records.push(record("https://broken/0", "credible"));
		let scorer = scorer.with_outcome("https://broken/0", 25, Vec::new());

		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.scorer(Arc::new(scorer))
			.build()
			.unwrap();

		let run = eval.run().await.unwrap();
		assert_eq!(run.result.scored_count, 10);
		assert_eq!(run.result.failure_count, 1);
		assert!(run.result.failures[0].reason.contains("aggregate score 25"));
	}

	#[tokio::test]
	async fn cancellation_keeps_partial_work_and_marks_incomplete() {
		let (records, _) = fixture();
		let flag = Arc::new(AtomicBool::new(false));

		// Scores the first item, then trips the flag so every later
		// dispatch is skipped. Concurrency 1 keeps the order deterministic.
		let tripwire = flag.clone();
		let scorer = from_async_fn("self-cancelling", move |_item| {
			let flag = tripwire.clone();
			async move {
				flag.store(true, Ordering::SeqCst);
				Ok(ScoreOutcome { aggregate_score: 18, criteria: Vec::new() })
			}
		});

		let eval = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.scorer(scorer)
			.concurrency(1)
			.cancel_flag(flag)
			.build()
			.unwrap();

		let run = eval.run().await.unwrap();
		assert!(run.result.incomplete);
		assert_eq!(run.result.scored_count, 1);
		assert_eq!(run.result.confusion_matrix.total(), 1);
	}

	#[tokio::test]
	async fn builder_requires_a_scorer() {
		let (records, _) = fixture();
		let err = Evaluation::builder()
			.data_source(Arc::new(VecDataSource::new(records)))
			.build()
			.unwrap_err();
		assert!(matches!(err, EvalError::Builder(_)));
	}
}
