//! Pure metric computation over a scored evaluation set.
//!
//! Everything here is deterministic in its inputs: a fixed list of
//! (ground truth, predicted score) pairs, a threshold, and a bin count.
//! Undefined ratios are reported with `defined = false`, never as NaN.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use credeval_types::{
    CalibrationMetrics, ClassificationMetrics, ConfusionMatrix, CriterionSeparation, Label,
    MetricValue, ReliabilityBin, ScoreDistribution, ScoreStats, ScoredItem, MAX_SCORE,
};

use crate::error::EvalError;

/// Project the scored set down to the (label, score) pairs the metric
/// functions consume.
pub fn label_score_pairs(scored: &[ScoredItem]) -> Vec<(Label, u8)> {
    scored
        .iter()
        .map(|s| (s.item.ground_truth_label, s.predicted_score))
        .collect()
}

/// Count the four confusion cells at a threshold (inclusive boundary:
/// `score >= threshold` predicts manipulative).
pub fn confusion_matrix(pairs: &[(Label, u8)], threshold: u8) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix::default();
    for &(label, score) in pairs {
        let predicted_positive = score >= threshold;
        match (label.is_positive(), predicted_positive) {
            (true, true) => cm.true_positives += 1,
            (true, false) => cm.false_negatives += 1,
            (false, true) => cm.false_positives += 1,
            (false, false) => cm.true_negatives += 1,
        }
    }
    cm
}

/// The four cells must account for every scored item, never the raw dataset
/// size when failures exist.
pub fn check_invariant(cm: &ConfusionMatrix, scored_count: usize) -> Result<(), EvalError> {
    if cm.total() != scored_count {
        return Err(EvalError::MetricsInvariant(format!(
            "confusion counts sum to {} but {} items were scored",
            cm.total(),
            scored_count
        )));
    }
    Ok(())
}

pub fn classification_metrics(cm: &ConfusionMatrix) -> ClassificationMetrics {
    let total = cm.total();
    let accuracy = if total == 0 {
        MetricValue::undefined()
    } else {
        MetricValue::defined((cm.true_positives + cm.true_negatives) as f64 / total as f64)
    };
    let precision = ratio(cm.true_positives, cm.true_positives + cm.false_positives);
    let recall = ratio(cm.true_positives, cm.true_positives + cm.false_negatives);
    let f1 = if precision.defined && recall.defined && precision.value + recall.value > 0.0 {
        MetricValue::defined(
            2.0 * precision.value * recall.value / (precision.value + recall.value),
        )
    } else {
        MetricValue::undefined()
    };

    ClassificationMetrics { accuracy, precision, recall, f1 }
}

fn ratio(numerator: usize, denominator: usize) -> MetricValue {
    if denominator == 0 {
        MetricValue::undefined()
    } else {
        MetricValue::defined(numerator as f64 / denominator as f64)
    }
}

/// Brier score, ECE, and MCE over normalized confidences `score / 20`.
///
/// Bins are equal-width over [0, 1]. Bin membership is computed in integer
/// arithmetic (`score * bins / 20`); a confidence of exactly 1.0 belongs to
/// the last bin.
pub fn calibration_metrics(pairs: &[(Label, u8)], bins: usize) -> CalibrationMetrics {
    let bins = bins.max(1);
    let n = pairs.len();
    if n == 0 {
        return CalibrationMetrics {
            brier: 0.0,
            ece: 0.0,
            mce: MetricValue::undefined(),
            bins: Vec::new(),
        };
    }

    let mut brier_sum = 0.0;
    let mut confidence_sums = vec![0.0; bins];
    let mut positive_counts = vec![0usize; bins];
    let mut counts = vec![0usize; bins];

    for &(label, score) in pairs {
        let confidence = f64::from(score) / f64::from(MAX_SCORE);
        let outcome = if label.is_positive() { 1.0 } else { 0.0 };
        brier_sum += (confidence - outcome) * (confidence - outcome);

        let idx = (usize::from(score) * bins / usize::from(MAX_SCORE)).min(bins - 1);
        confidence_sums[idx] += confidence;
        counts[idx] += 1;
        if label.is_positive() {
            positive_counts[idx] += 1;
        }
    }

    let width = 1.0 / bins as f64;
    let mut out_bins = Vec::new();
    let mut ece = 0.0;
    let mut mce = 0.0f64;
    for i in 0..bins {
        if counts[i] == 0 {
            continue;
        }
        let count = counts[i];
        let confidence = confidence_sums[i] / count as f64;
        let accuracy = positive_counts[i] as f64 / count as f64;
        let gap = (confidence - accuracy).abs();
        ece += count as f64 / n as f64 * gap;
        mce = mce.max(gap);
        out_bins.push(ReliabilityBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count,
            confidence,
            accuracy,
        });
    }

    CalibrationMetrics {
        brier: brier_sum / n as f64,
        ece,
        mce: MetricValue::defined(mce),
        bins: out_bins,
    }
}

/// Group separation per criterion, in first-seen order across the scored set.
/// The aggregate score is never re-derived from these values.
pub fn criterion_separations(scored: &[ScoredItem]) -> Vec<CriterionSeparation> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, (Vec<f64>, Vec<f64>)> = HashMap::new();

    for scored_item in scored {
        let positive = scored_item.item.ground_truth_label.is_positive();
        for cv in &scored_item.criteria {
            let groups = match by_name.entry(cv.criterion.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => {
                    order.push(cv.criterion.clone());
                    v.insert((Vec::new(), Vec::new()))
                }
            };
            if positive {
                groups.0.push(cv.value);
            } else {
                groups.1.push(cv.value);
            }
        }
    }

    order
        .into_iter()
        .map(|criterion| {
            let (manipulative, credible) = &by_name[&criterion];
            let manipulative_mean = mean(manipulative);
            let credible_mean = mean(credible);
            let separation = match (manipulative_mean, credible_mean) {
                (Some(m), Some(c)) => MetricValue::defined(m - c),
                _ => MetricValue::undefined(),
            };
            CriterionSeparation { criterion, manipulative_mean, credible_mean, separation }
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Score statistics within each ground-truth class and overall.
pub fn score_distribution(pairs: &[(Label, u8)]) -> ScoreDistribution {
    let manipulative: Vec<u8> = pairs
        .iter()
        .filter(|(label, _)| label.is_positive())
        .map(|&(_, score)| score)
        .collect();
    let credible: Vec<u8> = pairs
        .iter()
        .filter(|(label, _)| !label.is_positive())
        .map(|&(_, score)| score)
        .collect();
    let overall: Vec<u8> = pairs.iter().map(|&(_, score)| score).collect();

    ScoreDistribution {
        manipulative: score_stats(&manipulative),
        credible: score_stats(&credible),
        overall: score_stats(&overall),
    }
}

fn score_stats(scores: &[u8]) -> Option<ScoreStats> {
    if scores.is_empty() {
        return None;
    }
    let count = scores.len();
    let mean = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / count as f64;
    let variance =
        scores.iter().map(|&s| (f64::from(s) - mean).powi(2)).sum::<f64>() / count as f64;

    let mut sorted = scores.to_vec();
    sorted.sort_unstable();
    let median = if count % 2 == 1 {
        f64::from(sorted[count / 2])
    } else {
        (f64::from(sorted[count / 2 - 1]) + f64::from(sorted[count / 2])) / 2.0
    };

    Some(ScoreStats {
        count,
        mean,
        median,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[count - 1],
    })
}
