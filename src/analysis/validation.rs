//! Validation of untrusted scoring service payloads.
//!
//! This is the only place an `AnalysisResponse` is constructed. Anything that
//! fails a structural, type or range check is rejected as a whole.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::models::{AnalysisResponse, ComponentScore, ScoringMethod};

/// Minimum length of `ai_reasoning`, in characters.
pub const MIN_REASONING_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Response is not a JSON object: {0}")]
    NotJson(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Field {0} has the wrong type")]
    WrongType(&'static str),
    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("Component {component} scored {value}, above its weight {weight}")]
    ComponentOutOfRange {
        component: &'static str,
        value: f64,
        weight: u8,
    },
    #[error("ai_reasoning too short ({0} chars)")]
    ReasoningTooShort(usize),
}

impl ValidationError {
    /// A malformed payload is worth one more attempt.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Retryable
    }
}

/// Parse and validate a raw model reply into an `AnalysisResponse`.
pub fn validate_response(
    raw: &str,
    method: ScoringMethod,
) -> Result<AnalysisResponse, ValidationError> {
    let body = extract_json_object(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ValidationError::NotJson(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::NotJson("top-level value is not an object".to_string()))?;

    let score = required_number(obj, "qualification_score")?;
    if !(0.0..=100.0).contains(&score) {
        return Err(ValidationError::OutOfRange {
            field: "qualification_score",
            value: score,
        });
    }

    let confidence = required_number(obj, "confidence")?;
    if !(1.0..=100.0).contains(&confidence) {
        return Err(ValidationError::OutOfRange {
            field: "confidence",
            value: confidence,
        });
    }

    let reasoning = match obj.get("ai_reasoning") {
        None | Some(Value::Null) => return Err(ValidationError::MissingField("ai_reasoning")),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(ValidationError::WrongType("ai_reasoning")),
    };
    let reasoning_len = reasoning.chars().count();
    if reasoning_len < MIN_REASONING_CHARS {
        return Err(ValidationError::ReasoningTooShort(reasoning_len));
    }

    let matched_skills = string_list(obj, "matched_skills")?;
    let missing_skills = string_list(obj, "missing_skills")?;
    let recommendations = string_list(obj, "recommendations")?;
    let components = component_scores(obj, method)?;

    Ok(AnalysisResponse::from_validated(
        score.round() as u8,
        confidence.round() as u8,
        matched_skills,
        missing_skills,
        recommendations,
        components,
        method,
        reasoning,
    ))
}

/// Strip markdown code fences and surrounding prose around the JSON object.
fn extract_json_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn required_number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64().ok_or(ValidationError::WrongType(field)),
        Some(_) => Err(ValidationError::WrongType(field)),
    }
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(ValidationError::WrongType(field)),
            })
            .filter(|r| r.as_ref().map_or(true, |s| !s.is_empty()))
            .collect(),
        Some(_) => Err(ValidationError::WrongType(field)),
    }
}

fn component_scores(
    obj: &Map<String, Value>,
    method: ScoringMethod,
) -> Result<Vec<ComponentScore>, ValidationError> {
    let map = match obj.get("component_scores") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ValidationError::WrongType("component_scores")),
    };

    let mut scores = Vec::new();
    for component in method.components() {
        let Some(value) = map.get(component.key()) else {
            continue;
        };
        let points = value
            .as_f64()
            .ok_or(ValidationError::WrongType("component_scores"))?;
        let weight = component.weight();
        if points < 0.0 || points > weight as f64 {
            return Err(ValidationError::ComponentOutOfRange {
                component: component.key(),
                value: points,
                weight,
            });
        }
        scores.push(ComponentScore {
            component: *component,
            points: points as f32,
        });
    }

    for key in map.keys() {
        if !method.components().iter().any(|c| c.key() == key) {
            debug!("Ignoring unknown score component '{}'", key);
        }
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QualificationStatus;

    const VALID: &str = r#"{
        "qualification_score": 78,
        "confidence": 80,
        "matched_skills": ["Python"],
        "missing_skills": [],
        "recommendations": ["Highlight API work"],
        "component_scores": {"skills": 35, "experience_level_years": 22, "education_field": 10, "preferences": 11},
        "ai_reasoning": "Strong Python match and years in range."
    }"#;

    #[test]
    fn test_valid_response() {
        let resp = validate_response(VALID, ScoringMethod::ProfileOnly).unwrap();
        assert_eq!(resp.qualification_score(), 78);
        assert_eq!(resp.status(), QualificationStatus::Qualified);
        assert_eq!(resp.scoring_method(), ScoringMethod::ProfileOnly);
        assert_eq!(resp.components().len(), 4);
        assert_eq!(resp.matched_skills(), ["Python".to_string()]);
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(validate_response(&fenced, ScoringMethod::ProfileOnly).is_ok());
    }

    #[test]
    fn test_missing_score() {
        let raw = r#"{"confidence": 50, "ai_reasoning": "long enough reasoning"}"#;
        assert_eq!(
            validate_response(raw, ScoringMethod::ProfileOnly).unwrap_err(),
            ValidationError::MissingField("qualification_score")
        );
    }

    #[test]
    fn test_score_out_of_range() {
        let raw = r#"{"qualification_score": 101, "confidence": 50, "ai_reasoning": "long enough reasoning"}"#;
        assert!(matches!(
            validate_response(raw, ScoringMethod::ProfileOnly),
            Err(ValidationError::OutOfRange { field: "qualification_score", .. })
        ));
        let raw = r#"{"qualification_score": -1, "confidence": 50, "ai_reasoning": "long enough reasoning"}"#;
        assert!(validate_response(raw, ScoringMethod::ProfileOnly).is_err());
    }

    #[test]
    fn test_score_wrong_type() {
        let raw = r#"{"qualification_score": "80", "confidence": 50, "ai_reasoning": "long enough reasoning"}"#;
        assert_eq!(
            validate_response(raw, ScoringMethod::ProfileOnly).unwrap_err(),
            ValidationError::WrongType("qualification_score")
        );
    }

    #[test]
    fn test_short_reasoning() {
        let raw = r#"{"qualification_score": 80, "confidence": 50, "ai_reasoning": "Good fit"}"#;
        assert_eq!(
            validate_response(raw, ScoringMethod::ProfileOnly).unwrap_err(),
            ValidationError::ReasoningTooShort(8)
        );
    }

    #[test]
    fn test_confidence_range() {
        let raw = r#"{"qualification_score": 80, "confidence": 0, "ai_reasoning": "long enough reasoning"}"#;
        assert!(matches!(
            validate_response(raw, ScoringMethod::ProfileOnly),
            Err(ValidationError::OutOfRange { field: "confidence", .. })
        ));
    }

    #[test]
    fn test_component_above_weight() {
        let raw = r#"{"qualification_score": 80, "confidence": 50, "ai_reasoning": "long enough reasoning",
            "component_scores": {"years_match": 16}}"#;
        assert!(matches!(
            validate_response(raw, ScoringMethod::ResumeWeighted),
            Err(ValidationError::ComponentOutOfRange { component: "years_match", weight: 15, .. })
        ));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            validate_response("I think the candidate is great", ScoringMethod::ProfileOnly),
            Err(ValidationError::NotJson(_))
        ));
    }
}
