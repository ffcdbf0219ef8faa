//! Decision oracle contract: given one occurrence and the user's latest input,
//! decide whether to reuse the label's global value, fill a new value, or ask.
//!
//! The oracle is a black box to the state machine. Whatever it returns is
//! normalized into a [`Decision`] with every field present, and any failure is
//! turned into an `ask` by the caller (see [`Decision::fallback`]).

pub mod heuristic;
#[cfg(feature = "llm")]
pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use heuristic::HeuristicOracle;
#[cfg(feature = "llm")]
pub use llm::{LlmClient, LlmError, LlmOracle, Message};

/// Confidence assumed when the oracle does not state one.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;
/// Confidence of a free-text oracle reply taken as the question itself.
pub const LITERAL_QUESTION_CONFIDENCE: f64 = 0.4;
/// Confidence of the question asked after the oracle could not be reached.
pub const UNAVAILABLE_CONFIDENCE: f64 = 0.0;

/// Everything the oracle is told about one occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub placeholder_label: String,
    pub occurrence_context: String,
    pub user_input: String,
    /// Value already recorded for this label elsewhere, or empty.
    pub previous_global_value: String,
    /// Value already recorded for this exact occurrence, or empty.
    pub prior_occurrence_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Reuse,
    Fill,
    Ask,
}

impl DecisionAction {
    /// Unknown actions are treated as `ask`.
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => DecisionAction::Reuse,
            "fill" => DecisionAction::Fill,
            _ => DecisionAction::Ask,
        }
    }
}

/// A normalized oracle decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub filled_value: String,
    pub followup_question: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            action: DecisionAction::Ask,
            filled_value: String::new(),
            followup_question: String::new(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl Decision {
    pub fn reuse(confidence: f64) -> Self {
        Self {
            action: DecisionAction::Reuse,
            confidence,
            ..Self::default()
        }
    }

    pub fn fill(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: DecisionAction::Fill,
            filled_value: value.into(),
            confidence,
            ..Self::default()
        }
    }

    pub fn ask(question: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: DecisionAction::Ask,
            followup_question: question.into(),
            confidence,
            ..Self::default()
        }
    }

    /// Parse an oracle reply. Code fences are stripped; missing fields take
    /// their defaults. Returns `None` when the reply is not a JSON object.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(strip_code_fences(reply)).ok()?;
        let object = value.as_object()?;

        let text = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|key| object.get(*key))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };

        let action = object
            .get("action")
            .and_then(Value::as_str)
            .map(DecisionAction::parse)
            .unwrap_or(DecisionAction::Ask);
        let confidence = object
            .get("confidence")
            .and_then(|c| match c {
                Value::String(s) => s.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE);

        Some(Self {
            action,
            filled_value: text(&["filled_value", "filledValue"]),
            followup_question: text(&["followup_question", "followupQuestion"]),
            confidence,
        })
    }

    /// The `ask` that replaces a failed oracle call.
    pub fn fallback(error: &OracleError, label: &str) -> Self {
        match error {
            OracleError::Unavailable(_) => Self::ask(
                format!("Sorry, I hit an error. Please provide this value: {}", label),
                UNAVAILABLE_CONFIDENCE,
            ),
            OracleError::Malformed(_) => Self::ask(
                format!("Please provide the value for {}.", label),
                LITERAL_QUESTION_CONFIDENCE,
            ),
        }
    }
}

/// Why an oracle call produced no decision.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached or refused the request.
    #[error("decision oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with nothing usable.
    #[error("decision oracle returned an unusable reply: {0}")]
    Malformed(String),
}

/// Decides reuse/fill/ask for one occurrence per call.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, request: &OracleRequest) -> Result<Decision, OracleError>;
}

/// Strip markdown code fences from a model reply.
pub(crate) fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();

    if let Some(stripped) = trimmed.strip_prefix("```json") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }

    trimmed
}
