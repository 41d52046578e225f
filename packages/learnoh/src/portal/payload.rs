//! Readers for the portal's loosely typed JSON fields.
//!
//! The same key can arrive as a string, a number or `null` depending on
//! the endpoint, so raw items keep every field as a [`Value`] and these
//! helpers decide what it means.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::PortalTime;

/// Deserializes each item on its own so one odd record does not cost the
/// whole list.
pub(super) fn parse_items<T: DeserializeOwned>(endpoint: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| {
            serde_json::from_value(item)
                .map_err(|e| tracing::warn!(endpoint, "Skipping malformed item: {e}"))
                .ok()
        })
        .collect()
}

/// Field as text; `null` and missing become empty.
pub(super) fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// `null` and missing are absent; everything else is a time value.
pub(super) fn time(value: &Value) -> Option<PortalTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(PortalTime::Millis),
        Value::String(s) => Some(PortalTime::Text(s.clone())),
        _ => None,
    }
}

/// Truthiness the way the portal's web client reads it.
pub(super) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Numeric reading: numbers as is, numeric strings parsed, `true` as 1.
pub(super) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// True when the field is a string or number spelled like one of `accepted`.
/// Booleans never match.
pub(super) fn one_of(value: &Value, accepted: &[&str]) -> bool {
    match value {
        Value::String(s) => accepted.contains(&s.as_str()),
        Value::Number(n) => accepted.contains(&n.to_string().as_str()),
        _ => false,
    }
}
