//! Parsing of judge responses.
//!
//! Parsing runs in three phases:
//!
//! 1. Strip a surrounding fenced code block if present.
//! 2. Parse JSON and validate its structure with `jsonschema`: an object with a
//!    boolean `has_risk`, a string `reason` and an array `evidence`.
//! 3. Coerce `severity` and `recommended_action`. Out-of-set values fall back to
//!    `none` and `log`; each coercion is logged and returned as a warning.
//!
//! Any failure in phases 1–2 yields `None`, which callers treat as "could not
//! judge". Phase 3 never fails.

use serde_json::{json, Value};
use tracing::warn;

use warden_contracts::{
    error::{WardenError, WardenResult},
    judge::{JudgeResult, RecommendedAction, Severity},
};

/// A parsed verdict plus every coercion applied on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub result: JudgeResult,
    pub warnings: Vec<String>,
}

/// Return the body of a fenced code block, or the trimmed input.
///
/// Accepts an optional language tag on the opening fence (```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn response_schema() -> Value {
    json!({
        "type": "object",
        "required": ["has_risk", "reason", "evidence"],
        "properties": {
            "has_risk": { "type": "boolean" },
            "reason": { "type": "string" },
            "evidence": { "type": "array" }
        }
    })
}

/// Validates and coerces raw judge output.
pub struct ResponseParser {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseParser").finish_non_exhaustive()
    }
}

impl ResponseParser {
    pub fn new() -> WardenResult<Self> {
        let validator =
            jsonschema::validator_for(&response_schema()).map_err(|e| WardenError::ConfigError {
                reason: format!("invalid judge response schema: {e}"),
            })?;
        Ok(Self { validator })
    }

    /// Parse `raw` into a verdict attributed to `judge_type`.
    pub fn parse(&self, raw: &str, judge_type: &str) -> Option<ParsedResponse> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            warn!(judge_type = %judge_type, "judge returned an empty response");
            return None;
        }

        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!(judge_type = %judge_type, error = %e, "judge response is not valid JSON");
                return None;
            }
        };

        let violations: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|error| format!("{} at '{}'", error, error.instance_path))
            .collect();
        if !violations.is_empty() {
            warn!(judge_type = %judge_type, violations = ?violations, "judge response failed structural validation");
            return None;
        }

        let mut warnings = Vec::new();
        let severity = coerce_field::<Severity>(&value, "severity", &mut warnings);
        let recommended_action =
            coerce_field::<RecommendedAction>(&value, "recommended_action", &mut warnings);
        for warning in &warnings {
            warn!(judge_type = %judge_type, "{}", warning);
        }

        let evidence = value["evidence"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(ParsedResponse {
            result: JudgeResult {
                has_risk: value["has_risk"].as_bool().unwrap_or(false),
                severity,
                reason: value["reason"].as_str().unwrap_or_default().to_string(),
                evidence,
                recommended_action,
                raw_response: Some(raw.to_string()),
                judge_type: judge_type.to_string(),
            },
            warnings,
        })
    }
}

/// Read an enumerated string field, falling back to `T::default()`.
///
/// A missing field defaults silently; a present but out-of-set value is
/// recorded in `warnings`.
fn coerce_field<T>(value: &Value, field: &str, warnings: &mut Vec<String>) -> T
where
    T: std::str::FromStr + Default + std::fmt::Display,
{
    match value.get(field) {
        None | Some(Value::Null) => T::default(),
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| {
            let fallback = T::default();
            warnings.push(format!(
                "{field} '{s}' is not an allowed value; coerced to '{fallback}'"
            ));
            fallback
        }),
        Some(other) => {
            let fallback = T::default();
            warnings.push(format!(
                "{field} {other} is not a string; coerced to '{fallback}'"
            ));
            fallback
        }
    }
}
