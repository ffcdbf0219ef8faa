//! Resolved values handed to the rewriter.
//!
//! The caller states which shape it is sending with [`PayloadMode`]; the
//! parser never guesses from the JSON shape. Payloads that are not strict
//! JSON get one more chance through a lenient reader that accepts
//! Python-literal style input (single-quoted strings, `None`/`True`/`False`,
//! trailing commas).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;

/// Which shape of payload the caller is supplying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    /// One value per occurrence, in scan order.
    Ordered,
    /// One value per normalized label.
    Labeled,
}

/// One entry of an ordered payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedResponse {
    pub id: usize,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "responses", rename_all = "snake_case")]
pub enum ResponsesPayload {
    Ordered(Vec<OrderedResponse>),
    Labeled(BTreeMap<String, String>),
}

impl ResponsesPayload {
    /// Parse `input` as a payload of the given shape.
    ///
    /// Both a bare list/map and one wrapped as `{"responses": ...}` are
    /// accepted.
    pub fn parse(input: &str, mode: PayloadMode) -> Result<Self, PayloadError> {
        if input.trim().is_empty() {
            return Err(PayloadError::Empty);
        }
        let value = match serde_json::from_str::<Value>(input) {
            Ok(value) => value,
            Err(strict_err) => {
                let relaxed = lenient_to_json(input);
                let value = serde_json::from_str::<Value>(&relaxed)
                    .map_err(|_| PayloadError::Malformed(strict_err.to_string()))?;
                tracing::debug!("responses payload accepted by the lenient reader");
                value
            }
        };
        Self::from_value(value, mode)
    }

    pub fn from_value(value: Value, mode: PayloadMode) -> Result<Self, PayloadError> {
        let value = match value {
            Value::Object(mut map) if map.contains_key("responses") => {
                map.remove("responses").unwrap_or(Value::Null)
            }
            other => other,
        };

        match (mode, value) {
            (PayloadMode::Ordered, Value::Array(items)) => Ok(ResponsesPayload::Ordered(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| ordered_entry(index, item))
                    .collect(),
            )),
            (PayloadMode::Labeled, Value::Object(map)) => Ok(ResponsesPayload::Labeled(
                map.into_iter()
                    .map(|(label, value)| (label, scalar_to_string(&value)))
                    .collect(),
            )),
            (PayloadMode::Ordered, other) => Err(PayloadError::Malformed(format!(
                "ordered mode expects a list of responses, got {}",
                json_kind(&other)
            ))),
            (PayloadMode::Labeled, other) => Err(PayloadError::Malformed(format!(
                "labeled mode expects a label-to-value map, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn mode(&self) -> PayloadMode {
        match self {
            ResponsesPayload::Ordered(_) => PayloadMode::Ordered,
            ResponsesPayload::Labeled(_) => PayloadMode::Labeled,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResponsesPayload::Ordered(items) => items.len(),
            ResponsesPayload::Labeled(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered entry is normally `{id, label, value}`; a bare scalar is taken
/// as the value of the entry at that position.
fn ordered_entry(index: usize, item: Value) -> OrderedResponse {
    match item {
        Value::Object(map) => OrderedResponse {
            id: map
                .get("id")
                .and_then(Value::as_u64)
                .map(|id| id as usize)
                .unwrap_or(index),
            label: map.get("label").map(scalar_to_string).unwrap_or_default(),
            value: map.get("value").map(scalar_to_string).unwrap_or_default(),
        },
        scalar => OrderedResponse {
            id: index,
            label: String::new(),
            value: scalar_to_string(&scalar),
        },
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Rewrite Python-literal style input into JSON text.
///
/// Single-quoted strings become double-quoted, `None`/`True`/`False` become
/// `null`/`true`/`false`, and trailing commas before `]` or `}` are dropped.
/// The result is not validated here; the caller feeds it to `serde_json`.
fn lenient_to_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                pos += 1;
                while pos < chars.len() && chars[pos] != quote {
                    match chars[pos] {
                        '\\' if pos + 1 < chars.len() => {
                            let next = chars[pos + 1];
                            if next == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(next);
                            }
                            pos += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        other => out.push(other),
                    }
                    pos += 1;
                }
                out.push('"');
                pos += 1;
            }
            ',' => {
                let mut look = pos + 1;
                while look < chars.len() && chars[look].is_whitespace() {
                    look += 1;
                }
                if look < chars.len() && (chars[look] == ']' || chars[look] == '}') {
                    pos += 1;
                    continue;
                }
                out.push(',');
                pos += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_')
                {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                match word.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    _ => out.push_str(&word),
                }
            }
            other => {
                out.push(other);
                pos += 1;
            }
        }
    }
    out
}
