//! Threshold sweeping over an already-scored set. No re-scoring happens here;
//! calibration and per-criterion diagnostics are threshold-independent and
//! belong to the single evaluation pass.

use credeval_types::{ScoredItem, SweepPoint, ThresholdSweepResult};

use crate::metrics;

/// Recompute classification metrics for each candidate threshold, in the
/// order given. The selected threshold maximizes F1; ties go to the lowest
/// threshold value.
///
/// Recall is monotone non-increasing as the threshold rises, since the
/// predicted-positive set only shrinks. Precision carries no such guarantee.
pub fn sweep_thresholds(scored: &[ScoredItem], thresholds: &[u8]) -> ThresholdSweepResult {
    let pairs = metrics::label_score_pairs(scored);

    let points: Vec<SweepPoint> = thresholds
        .iter()
        .map(|&threshold| {
            let cm = metrics::confusion_matrix(&pairs, threshold);
            SweepPoint {
                threshold,
                classification_metrics: metrics::classification_metrics(&cm),
                confusion_matrix: cm,
            }
        })
        .collect();

    let mut selected: Option<(u8, f64)> = None;
    for point in &points {
        let f1 = point.classification_metrics.f1.value;
        let better = match selected {
            None => true,
            Some((best_threshold, best_f1)) => {
                f1 > best_f1 || (f1 == best_f1 && point.threshold < best_threshold)
            }
        };
        if better {
            selected = Some((point.threshold, f1));
        }
    }

    ThresholdSweepResult {
        points,
        selected_threshold: selected.map(|(threshold, _)| threshold),
    }
}
