//! Retrieval of misclassified sources, most confidently wrong first.

use credeval_types::{ErrorCategory, Label, Misclassification, ScoredItem};

/// Filter the scored set down to one error category at a threshold and rank
/// by distance from the boundary: false positives by highest predicted score,
/// false negatives by lowest. Ties keep dataset order.
pub fn find_misclassifications(
    scored: &[ScoredItem],
    threshold: u8,
    category: ErrorCategory,
    limit: usize,
) -> Vec<Misclassification> {
    let mut found: Vec<&ScoredItem> = scored
        .iter()
        .filter(|s| {
            let predicted = s.predicted_label(threshold);
            match category {
                ErrorCategory::FalsePositive => {
                    predicted == Label::Manipulative
                        && s.item.ground_truth_label == Label::Credible
                }
                ErrorCategory::FalseNegative => {
                    predicted == Label::Credible
                        && s.item.ground_truth_label == Label::Manipulative
                }
            }
        })
        .collect();

    match category {
        ErrorCategory::FalsePositive => {
            found.sort_by(|a, b| b.predicted_score.cmp(&a.predicted_score));
        }
        ErrorCategory::FalseNegative => {
            found.sort_by(|a, b| a.predicted_score.cmp(&b.predicted_score));
        }
    }
    found.truncate(limit);

    found
        .into_iter()
        .map(|s| Misclassification {
            index: s.index,
            url: s.item.url.clone(),
            title: s.item.title.clone(),
            source_dataset: s.item.source_dataset.clone(),
            predicted_score: s.predicted_score,
            predicted_label: s.predicted_label(threshold),
            ground_truth_label: s.item.ground_truth_label,
            ground_truth_score: s.item.ground_truth_score,
            category,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use credeval_types::EvaluationItem;
    use serde_json::Map;

    fn scored_item(index: usize, label: Label, score: u8) -> ScoredItem {
        ScoredItem {
            index,
            item: EvaluationItem {
                text: "x".repeat(80),
                url: format!("https://example.com/{index}"),
                title: format!("Source {index}"),
                ground_truth_label: label,
                ground_truth_score: None,
                source_dataset: "unit".to_string(),
                metadata: Map::new(),
                added_at: None,
            },
            predicted_score: score,
            criteria: Vec::new(),
        }
    }

    fn fixture() -> Vec<ScoredItem> {
        let mut scored = Vec::new();
        for (i, score) in [18u8, 16, 14, 12, 9].into_iter().enumerate() {
            scored.push(scored_item(i, Label::Manipulative, score));
        }
        for (i, score) in [1u8, 3, 4, 7, 11].into_iter().enumerate() {
            scored.push(scored_item(5 + i, Label::Credible, score));
        }
        scored
    }

    #[test]
    fn false_positives_rank_highest_score_first() {
        let found = find_misclassifications(&fixture(), 6, ErrorCategory::FalsePositive, 10);
        let scores: Vec<u8> = found.iter().map(|m| m.predicted_score).collect();
        assert_eq!(scores, vec![11, 7]);
        assert!(found
            .iter()
            .all(|m| m.ground_truth_label == Label::Credible
                && m.predicted_label == Label::Manipulative));
    }

    #[test]
    fn false_negatives_rank_lowest_score_first() {
        let found = find_misclassifications(&fixture(), 13, ErrorCategory::FalseNegative, 10);
        let scores: Vec<u8> = found.iter().map(|m| m.predicted_score).collect();
        assert_eq!(scores, vec![9, 12]);
    }

    #[test]
    fn limit_truncates_after_ranking() {
        let found = find_misclassifications(&fixture(), 6, ErrorCategory::FalsePositive, 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].predicted_score, 11);
    }

    #[test]
    fn no_errors_in_the_requested_direction_yields_nothing() {
        let found = find_misclassifications(&fixture(), 6, ErrorCategory::FalseNegative, 10);
        assert!(found.is_empty());
    }
}
