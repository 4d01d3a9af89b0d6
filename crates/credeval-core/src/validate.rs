//! Structural and semantic validation of raw dataset records.
//!
//! Validation runs on untyped JSON before anything is deserialized, so a
//! malformed record produces a field-level report instead of a serde error.
//! A single error fails the whole dataset; metrics are never computed over
//! ground truth that did not validate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use credeval_types::{EvaluationItem, MAX_SCORE};

use crate::error::EvalError;

/// Minimum `text` length; anything shorter cannot be meaningfully scored.
pub const MIN_TEXT_LEN: usize = 50;

const REQUIRED_STRING_FIELDS: [&str; 5] =
    ["text", "url", "title", "ground_truth_label", "source_dataset"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub index: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub total: usize,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} record(s), {} error(s), {} warning(s)",
            self.total,
            self.errors.len(),
            self.warnings.len()
        )?;
        for issue in &self.errors {
            writeln!(f, "  error   [{}] {}: {}", issue.index, issue.field, issue.message)?;
        }
        for issue in &self.warnings {
            writeln!(f, "  warning [{}] {}: {}", issue.index, issue.field, issue.message)?;
        }
        Ok(())
    }
}

fn issue(index: usize, field: &str, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue { index, field: field.to_string(), message: message.into() }
}

/// Check every record and collect field-level errors and warnings.
pub fn validate_records(records: &[Value]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Some(obj) = record.as_object() else {
            errors.push(issue(index, "<record>", "expected a JSON object"));
            continue;
        };

        for field in REQUIRED_STRING_FIELDS {
            match obj.get(field) {
                None | Some(Value::Null) => {
                    errors.push(issue(index, field, "missing required field"));
                }
                Some(Value::String(_)) => {}
                Some(_) => errors.push(issue(index, field, "expected a string")),
            }
        }

        if let Some(Value::String(text)) = obj.get("text") {
            if text.chars().count() < MIN_TEXT_LEN {
                errors.push(issue(
                    index,
                    "text",
                    format!("text must be at least {} characters", MIN_TEXT_LEN),
                ));
            }
        }

        if let Some(Value::String(label)) = obj.get("ground_truth_label") {
            if label != "manipulative" && label != "credible" {
                errors.push(issue(
                    index,
                    "ground_truth_label",
                    "must be 'manipulative' or 'credible'",
                ));
            }
        }

        match obj.get("ground_truth_score") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => match n.as_u64() {
                Some(score) if score <= u64::from(MAX_SCORE) => {}
                _ => errors.push(issue(
                    index,
                    "ground_truth_score",
                    format!("must be an integer between 0 and {}", MAX_SCORE),
                )),
            },
            Some(_) => errors.push(issue(
                index,
                "ground_truth_score",
                format!("must be an integer between 0 and {}", MAX_SCORE),
            )),
        }

        if !obj.contains_key("metadata") {
            warnings.push(issue(index, "metadata", "optional field missing"));
        }
        if !obj.contains_key("added_at") {
            warnings.push(issue(index, "added_at", "optional field missing"));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        total: records.len(),
        errors,
        warnings,
    }
}

/// Validate, then deserialize into typed items. Fails with the full report
/// when any record is invalid; no partial dataset is ever returned.
pub fn parse_items(records: &[Value]) -> Result<Vec<EvaluationItem>, EvalError> {
    let report = validate_records(records);
    if !report.valid {
        return Err(EvalError::DatasetValidation(report));
    }

    let mut items = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let item: EvaluationItem = serde_json::from_value(record.clone())
            .map_err(|source| EvalError::RecordDecode { index, source })?;
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use credeval_types::Label;
    use serde_json::json;

    fn record(text_len: usize) -> Value {
        json!({
            "text": "a".repeat(text_len),
            "url": "https://example.com/x",
            "title": "X",
            "ground_truth_label": "credible",
            "source_dataset": "unit",
            "metadata": {},
            "added_at": "2026-01-01T00:00:00",
        })
    }

    #[test]
    fn short_text_is_an_error_naming_index_and_field() {
        let report = validate_records(&[record(49)]);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 0);
        assert_eq!(report.errors[0].field, "text");
    }

    #[test]
    fn text_of_exactly_fifty_chars_passes() {
        let report = validate_records(&[record(50)]);
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut rec = record(80);
        rec.as_object_mut().unwrap().remove("source_dataset");
        let report = validate_records(&[rec]);
        assert!(!report.valid);
        assert_eq!(report.errors[0].field, "source_dataset");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut rec = record(80);
        rec["ground_truth_label"] = json!("dubious");
        let report = validate_records(&[rec]);
        assert!(report.errors.iter().any(|e| e.field == "ground_truth_label"));
    }

    #[test]
    fn ground_truth_score_must_stay_in_range() {
        let mut rec = record(80);
        rec["ground_truth_score"] = json!(21);
        let report = validate_records(&[rec]);
        assert!(report.errors.iter().any(|e| e.field == "ground_truth_score"));

        let mut rec = record(80);
        rec["ground_truth_score"] = json!(-1);
        let report = validate_records(&[rec]);
        assert!(report.errors.iter().any(|e| e.field == "ground_truth_score"));
    }

    #[test]
    fn non_object_record_is_an_error() {
        let report = validate_records(&[json!("not an object")]);
        assert!(!report.valid);
        assert_eq!(report.errors[0].field, "<record>");
    }

    #[test]
    fn missing_optional_fields_are_warnings_only() {
        let mut rec = record(80);
        rec.as_object_mut().unwrap().remove("metadata");
        rec.as_object_mut().unwrap().remove("added_at");
        let report = validate_records(&[rec]);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn parse_items_yields_typed_records() {
        let mut rec = record(80);
        rec["ground_truth_score"] = json!(3);
        let items = parse_items(&[rec]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ground_truth_label, Label::Credible);
        assert_eq!(items[0].ground_truth_score, Some(3));
    }

    #[test]
    fn parse_items_fails_with_the_full_report() {
        let err = parse_items(&[record(10)]).unwrap_err();
        match err {
            crate::error::EvalError::DatasetValidation(report) => {
                assert_eq!(report.errors[0].field, "text");
            }
            other => panic!("expected DatasetValidation, got {other}"),
        }
    }
}
