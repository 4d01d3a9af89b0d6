use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tabled::{Table, Tabled};

/// Highest aggregate score the scorer can assign; also the calibration divisor.
pub const MAX_SCORE: u8 = 20;

/// Ground-truth (or derived) class for a source. `Manipulative` is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
	Manipulative,
	Credible,
}

impl Label {
	pub fn is_positive(self) -> bool {
		matches!(self, Label::Manipulative)
	}
}

impl std::fmt::Display for Label {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Label::Manipulative => write!(f, "manipulative"),
			Label::Credible => write!(f, "credible"),
		}
	}
}

/// One labeled source record. Created by dataset loading and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationItem {
	pub text: String,
	pub url: String,
	pub title: String,
	pub ground_truth_label: Label,
	/// Expert-assigned score, advisory only. Never enters classification metrics.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ground_truth_score: Option<u8>,
	pub source_dataset: String,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub metadata: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub added_at: Option<String>,
}

/// One named criterion signal. The combination rule that turns criteria into
/// the aggregate score belongs to the scorer; this layer treats values as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionValue {
	pub criterion: String,
	pub value: f64,
}

/// A successfully scored item. Immutable once produced; the predicted label is
/// derived on demand rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
	/// Position of the item in the original dataset.
	pub index: usize,
	pub item: EvaluationItem,
	pub predicted_score: u8,
	pub criteria: Vec<CriterionValue>,
}

impl ScoredItem {
	/// Label implied by the score at the given threshold (inclusive boundary).
	pub fn predicted_label(&self, threshold: u8) -> Label {
		if self.predicted_score >= threshold {
			Label::Manipulative
		} else {
			Label::Credible
		}
	}

	/// Normalized confidence in [0, 1] used for calibration.
	pub fn confidence(&self) -> f64 {
		f64::from(self.predicted_score) / f64::from(MAX_SCORE)
	}
}

/// A per-item scoring failure. Excluded from every metric denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringFailure {
	pub index: usize,
	pub url: String,
	pub reason: String,
}

/// A metric together with whether its denominator was non-degenerate.
/// Undefined metrics carry 0.0, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
	pub value: f64,
	pub defined: bool,
}

impl MetricValue {
	pub fn defined(value: f64) -> Self {
		Self { value, defined: true }
	}

	pub fn undefined() -> Self {
		Self { value: 0.0, defined: false }
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
	pub true_positives: usize,
	pub true_negatives: usize,
	pub false_positives: usize,
	pub false_negatives: usize,
}

impl ConfusionMatrix {
	pub fn total(&self) -> usize {
		self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationMetrics {
	pub accuracy: MetricValue,
	pub precision: MetricValue,
	pub recall: MetricValue,
	pub f1: MetricValue,
}

/// One non-empty reliability bin. `lower` is inclusive, `upper` exclusive,
/// except the last bin which also contains 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityBin {
	pub lower: f64,
	pub upper: f64,
	pub count: usize,
	pub confidence: f64,
	pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetrics {
	pub brier: f64,
	pub ece: f64,
	pub mce: MetricValue,
	pub bins: Vec<ReliabilityBin>,
}

/// Group separation for one criterion: mean value among ground-truth
/// manipulative items minus the mean among credible items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionSeparation {
	pub criterion: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub manipulative_mean: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub credible_mean: Option<f64>,
	pub separation: MetricValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreStats {
	pub count: usize,
	pub mean: f64,
	pub median: f64,
	pub std_dev: f64,
	pub min: u8,
	pub max: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDistribution {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub manipulative: Option<ScoreStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub credible: Option<ScoreStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub overall: Option<ScoreStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub classification_metrics: ClassificationMetrics,
	pub calibration_metrics: CalibrationMetrics,
	pub confusion_matrix: ConfusionMatrix,
	pub per_criterion_metrics: Vec<CriterionSeparation>,
	pub score_distribution: ScoreDistribution,
	pub threshold_used: u8,
	pub scored_count: usize,
	pub failure_count: usize,
	pub failures: Vec<ScoringFailure>,
	/// Set when the run was cancelled before every item could be scored.
	pub incomplete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
	FalsePositive,
	FalseNegative,
}

/// A misclassified source with the values needed for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Misclassification {
	pub index: usize,
	pub url: String,
	pub title: String,
	pub source_dataset: String,
	pub predicted_score: u8,
	pub predicted_label: Label,
	pub ground_truth_label: Label,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ground_truth_score: Option<u8>,
	pub category: ErrorCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
	pub threshold: u8,
	pub confusion_matrix: ConfusionMatrix,
	pub classification_metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSweepResult {
	pub points: Vec<SweepPoint>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub selected_threshold: Option<u8>,
}

#[derive(Tabled)]
struct MetricRow {
	metric: String,
	value: String,
}

#[derive(Tabled)]
struct SweepRow {
	threshold: u8,
	precision: String,
	recall: String,
	f1: String,
	tp: usize,
	fp: usize,
	tn: usize,
	#[tabled(rename = "fn")]
	fnn: usize,
}

impl EvaluationResult {
	pub fn summary_table(&self) -> String {
		let c = &self.classification_metrics;
		let rows = vec![
			metric_row("accuracy", c.accuracy),
			metric_row("precision", c.precision),
			metric_row("recall", c.recall),
			metric_row("f1", c.f1),
			MetricRow {
				metric: "brier".to_string(),
				value: format!("{:.3}", self.calibration_metrics.brier),
			},
			MetricRow {
				metric: "ece".to_string(),
				value: format!("{:.3}", self.calibration_metrics.ece),
			},
			metric_row("mce", self.calibration_metrics.mce),
		];
		let table = Table::new(rows).to_string();

		let cm = &self.confusion_matrix;
		let mut footer = format!(
			"Scored: {}  Failures: {}  Threshold: {}\nTP: {}  FP: {}  TN: {}  FN: {}",
			self.scored_count,
			self.failure_count,
			self.threshold_used,
			cm.true_positives,
			cm.false_positives,
			cm.true_negatives,
			cm.false_negatives
		);
		if self.incomplete {
			footer.push_str("\nIncomplete: the run was cancelled before every item was scored");
		}

		format!("{}\n\n{}\n", table, footer)
	}
}

impl ThresholdSweepResult {
	pub fn sweep_table(&self) -> String {
		let rows: Vec<SweepRow> = self
			.points
			.iter()
			.map(|p| SweepRow {
				threshold: p.threshold,
				precision: render_metric(p.classification_metrics.precision),
				recall: render_metric(p.classification_metrics.recall),
				f1: render_metric(p.classification_metrics.f1),
				tp: p.confusion_matrix.true_positives,
				fp: p.confusion_matrix.false_positives,
				tn: p.confusion_matrix.true_negatives,
				fnn: p.confusion_matrix.false_negatives,
			})
			.collect();
		let table = Table::new(rows).to_string();

		match self.selected_threshold {
			Some(t) => format!("{}\n\nSelected threshold: {} (best F1, ties to the lowest)\n", table, t),
			None => format!("{}\n", table),
		}
	}
}

fn metric_row(name: &str, value: MetricValue) -> MetricRow {
	MetricRow { metric: name.to_string(), value: render_metric(value) }
}

fn render_metric(value: MetricValue) -> String {
	if value.defined {
		format!("{:.3}", value.value)
	} else {
		"n/a".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(label: Label) -> EvaluationItem {
		EvaluationItem {
			text: "x".repeat(80),
			url: "https://example.com/a".to_string(),
			title: "A".to_string(),
			ground_truth_label: label,
			ground_truth_score: None,
			source_dataset: "unit".to_string(),
			metadata: Map::new(),
			added_at: None,
		}
	}

	#[test]
	fn predicted_label_boundary_is_inclusive() {
		let scored = ScoredItem {
			index: 0,
			item: item(Label::Credible),
			predicted_score: 6,
			criteria: Vec::new(),
		};
		assert_eq!(scored.predicted_label(6), Label::Manipulative);
		assert_eq!(scored.predicted_label(7), Label::Credible);
	}

	#[test]
	fn confidence_is_normalized() {
		let scored = ScoredItem {
			index: 0,
			item: item(Label::Manipulative),
			predicted_score: 20,
			criteria: Vec::new(),
		};
		assert_eq!(scored.confidence(), 1.0);
	}

	#[test]
	fn labels_use_lowercase_wire_names() {
		let label: Label = serde_json::from_str("\"manipulative\"").unwrap();
		assert_eq!(label, Label::Manipulative);
		assert_eq!(serde_json::to_string(&Label::Credible).unwrap(), "\"credible\"");
	}
}
