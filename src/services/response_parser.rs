// src/services/response_parser.rs
//! Turns loosely structured model text into typed stage results.
//!
//! Every entry point here is total: whatever the model sends back, callers
//! get a well-formed value. Decode failures become the payload's fallback,
//! with a note in its issues/recommendations list.

use crate::models::{AnalysisResult, CountComparison, ElementComparison, ValidationResult};
use log::warn;
use serde::Deserialize;
use serde::Deserializer;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A JSON document the model is asked to produce.
pub trait ModelPayload: DeserializeOwned {
    /// Short label used in log lines.
    const KIND: &'static str;

    /// Degraded value returned when the response cannot be decoded.
    fn fallback() -> Self;
}

impl ModelPayload for AnalysisResult {
    const KIND: &'static str = "analysis";

    fn fallback() -> Self {
        AnalysisResult {
            recommendations: vec!["Unable to parse detailed analysis".to_string()],
            ..AnalysisResult::default()
        }
    }
}

impl ModelPayload for ValidationResult {
    const KIND: &'static str = "validation";

    /// Counts are reported as mismatched so the verdict message says that
    /// nothing could be compared.
    fn fallback() -> Self {
        let unverified = CountComparison {
            matches: Some(false),
            ..CountComparison::default()
        };
        ValidationResult {
            element_comparison: ElementComparison {
                people_count: unverified,
                objects_count: unverified,
                ..ElementComparison::default()
            },
            issues_found: vec![
                "Validation analysis failed - could not parse response".to_string(),
            ],
            ..ValidationResult::default()
        }
    }
}

/// Greedy span from the first `{` to the last `}`.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode `raw` into `T`, falling back instead of failing.
pub fn interpret<T: ModelPayload>(raw: &str) -> T {
    let Some(span) = extract_json_span(raw) else {
        warn!("No JSON object found in {} response", T::KIND);
        return T::fallback();
    };

    match serde_json::from_str::<T>(span) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to decode {} JSON: {}", T::KIND, e);
            T::fallback()
        }
    }
}

pub fn parse_analysis(raw: &str) -> AnalysisResult {
    interpret(raw)
}

pub fn parse_validation(raw: &str) -> ValidationResult {
    interpret(raw)
}

/// Integer reading with `parseInt`-like string handling: leading sign and
/// digits are kept, anything after them is ignored.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}

// Field readers used by the `#[serde(deserialize_with)]` attributes in models.

pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

pub(crate) fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    })
}

pub(crate) fn lenient_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_integer(&value)
        .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(0))
}

pub(crate) fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_integer(&value)
        .map(|n| n.clamp(0, 100) as u8)
        .unwrap_or(0))
}

pub(crate) fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
