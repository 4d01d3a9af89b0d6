use async_trait::async_trait;
use serde_json::{json, Value};

use credeval_types::{CriterionValue, EvaluationItem, MAX_SCORE};

use crate::error::ScoringError;
use crate::scorer::{ScoreOutcome, Scorer};

/// Scores sources against an HTTP endpoint.
///
/// POSTs `{ "text", "url", "title" }` and expects a JSON body with an
/// integer `aggregate_score` (0-20) and an optional `criteria_scores`
/// object. Criterion entries may be plain numbers, booleans, or
/// `{ "matched": bool, ... }` objects; all are normalized to f64.
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpScorer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn score(&self, item: &EvaluationItem) -> Result<ScoreOutcome, ScoringError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "text": item.text,
                "url": item.url,
                "title": item.title,
            }))
            .send()
            .await
            .map_err(|err| ScoringError::Endpoint(err.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| ScoringError::MalformedResponse(err.to_string()))?;
        if !status.is_success() {
            return Err(ScoringError::Endpoint(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        parse_outcome(&body)
    }
}

fn parse_outcome(body: &Value) -> Result<ScoreOutcome, ScoringError> {
    let aggregate = body
        .get("aggregate_score")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            ScoringError::MalformedResponse("missing integer 'aggregate_score'".to_string())
        })?;
    if aggregate > u64::from(MAX_SCORE) {
        return Err(ScoringError::ScoreOutOfRange(aggregate));
    }

    let mut criteria = Vec::new();
    if let Some(map) = body.get("criteria_scores").and_then(Value::as_object) {
        for (criterion, entry) in map {
            let value = match entry {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::Bool(matched) => f64::from(u8::from(*matched)),
                Value::Object(o) => match o.get("matched").and_then(Value::as_bool) {
                    Some(matched) => f64::from(u8::from(matched)),
                    None => 0.0,
                },
                _ => 0.0,
            };
            criteria.push(CriterionValue { criterion: criterion.clone(), value });
        }
    }

    Ok(ScoreOutcome { aggregate_score: aggregate as u8, criteria })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_matched_criteria() {
        let body = json!({
            "aggregate_score": 12,
            "criteria_scores": {
                "timing": { "matched": true, "reason": "suspicious launch window" },
                "emotional_manipulation": 0.5,
                "bandwagon_effect": false,
            },
        });
        let outcome = parse_outcome(&body).unwrap();
        assert_eq!(outcome.aggregate_score, 12);
        let timing = outcome.criteria.iter().find(|c| c.criterion == "timing").unwrap();
        assert_eq!(timing.value, 1.0);
        let bandwagon =
            outcome.criteria.iter().find(|c| c.criterion == "bandwagon_effect").unwrap();
        assert_eq!(bandwagon.value, 0.0);
    }

    #[test]
    fn missing_aggregate_is_malformed() {
        let err = parse_outcome(&json!({ "criteria_scores": {} })).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedResponse(_)));
    }

    #[test]
    fn out_of_range_aggregate_is_rejected() {
        let err = parse_outcome(&json!({ "aggregate_score": 21 })).unwrap_err();
        assert!(matches!(err, ScoringError::ScoreOutOfRange(21)));
    }

    #[test]
    fn fractional_aggregate_is_malformed() {
        let err = parse_outcome(&json!({ "aggregate_score": 7.5 })).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedResponse(_)));
    }
}
