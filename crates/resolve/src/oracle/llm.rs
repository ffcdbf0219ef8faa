//! LLM-backed oracle: LlmOracle, the LlmClient trait, OpenAI and Anthropic
//! clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Decision, DecisionOracle, OracleError, OracleRequest, LITERAL_QUESTION_CONFIDENCE};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Error type for LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Network or HTTP error.
    #[error("LLM network error: {0}")]
    Network(String),
    /// The API answered with an error status.
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The API response did not have the expected shape.
    #[error("LLM parse error: {0}")]
    Parse(String),
}

impl From<LlmError> for OracleError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(msg) => OracleError::Malformed(msg),
            other => OracleError::Unavailable(other.to_string()),
        }
    }
}

/// A message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for calling an LLM to get a text completion.
///
/// Implementations handle the specifics of one vendor API. The oracle
/// handles prompt construction and reply parsing.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: Vec<Message>, model: &str) -> Result<String, LlmError>;
}

/// A decision oracle that asks an LLM.
///
/// The request is sent as a JSON object; the reply is expected to be a JSON
/// decision. A reply that is plain prose is taken as the question to ask.
pub struct LlmOracle {
    pub client: Box<dyn LlmClient>,
    /// Model identifier passed to the client.
    pub model: String,
    /// System prompt override. If empty, the default prompt is used.
    pub system_prompt: String,
}

impl LlmOracle {
    pub fn new(client: Box<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: String::new(),
        }
    }

    fn default_system_prompt() -> &'static str {
        r#"You help fill the blanks of a legal document template, one blank at a time.

You receive a JSON object:
- placeholder_label: normalized label of this blank, e.g. "COMPANY NAME", "$[__________]", "DATE OF SAFE"
- occurrence_context: the words around this blank in the document
- previous_global_value: the value already given for the same label elsewhere, or ""
- prior_occurrence_value: the value already given for this exact blank, or ""
- user_input: the user's latest answer, or "" on the first turn

Choose one action:
- "reuse": use previous_global_value for this blank (the same entity appears again)
- "fill": take the value for this blank from user_input, normalized
- "ask": ask one short question that names what the context says is needed

Guidance:
- Identity-like labels (company name, investor name, date, state of incorporation) usually reuse.
- Money-like labels (containing '$', purchase amount, price, valuation cap) usually differ per blank: ask, or fill from user_input.
- If user_input clearly answers, fill.
- Never make up a value that the user did not give.

Respond with JSON only, no markdown fences:
{"action": "ask", "filled_value": "", "followup_question": "What is the purchase amount for this SAFE?", "confidence": 0.85}"#
    }

    fn build_user_message(request: &OracleRequest) -> String {
        serde_json::to_string(request).unwrap_or_else(|_| "{}".to_string())
    }

    /// Interpret the model's reply.
    fn interpret(reply: &str) -> Result<Decision, OracleError> {
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(OracleError::Malformed("empty reply".to_string()));
        }
        match Decision::from_reply(reply) {
            Some(decision) => Ok(decision),
            None => {
                tracing::debug!("oracle reply is not JSON; using it as the question");
                Ok(Decision::ask(reply, LITERAL_QUESTION_CONFIDENCE))
            }
        }
    }
}

#[async_trait]
impl DecisionOracle for LlmOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        let system_prompt = if self.system_prompt.is_empty() {
            Self::default_system_prompt().to_string()
        } else {
            self.system_prompt.clone()
        };
        let messages = vec![
            Message::system(system_prompt),
            Message::user(Self::build_user_message(request)),
        ];

        let reply = self.client.complete(messages, &self.model).await?;
        Self::interpret(&reply)
    }
}

// ── OpenAiClient ─────────────────────────────────────────────────────

/// Chat Completions client. Uses `ureq` for HTTP on a blocking thread.
pub struct OpenAiClient {
    pub api_key: String,
    /// Base URL (default: https://api.openai.com).
    pub base_url: String,
    pub temperature: f64,
}

impl OpenAiClient {
    /// Create a client from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Network("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com".to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: Vec<Message>, model: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.clone();
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "temperature": self.temperature,
            "messages": messages,
        });

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("authorization", &format!("Bearer {}", api_key))
                .header("content-type", "application/json")
                .send_json(body)
                .map_err(transport_error)?;

            let json: serde_json::Value = response.into_body().read_json().map_err(|e| {
                LlmError::Parse(format!("Failed to parse OpenAI response: {}", e))
            })?;
            json["choices"]
                .as_array()
                .and_then(|choices| choices.first())
                .and_then(|choice| choice["message"]["content"].as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| LlmError::Parse("No message content in OpenAI response".to_string()))
        })
        .await
        .map_err(|e| LlmError::Network(format!("Task join error: {}", e)))?
    }
}

// ── AnthropicClient ──────────────────────────────────────────────────

/// Messages API client. Uses `ureq` for HTTP on a blocking thread.
pub struct AnthropicClient {
    pub api_key: String,
    /// Base URL (default: https://api.anthropic.com).
    pub base_url: String,
    pub temperature: f64,
}

impl AnthropicClient {
    /// Create a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::Network("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: Vec<Message>, model: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.clone();
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        // The Messages API takes the system prompt as a separate field.
        let system: Option<String> = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());
        let non_system: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": 1024,
            "temperature": self.temperature,
            "messages": non_system,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys);
        }

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .send_json(body)
                .map_err(transport_error)?;

            let json: serde_json::Value = response.into_body().read_json().map_err(|e| {
                LlmError::Parse(format!("Failed to parse Anthropic response: {}", e))
            })?;
            json["content"]
                .as_array()
                .and_then(|blocks| blocks.first())
                .and_then(|block| block["text"].as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| LlmError::Parse("No text content in Anthropic response".to_string()))
        })
        .await
        .map_err(|e| LlmError::Network(format!("Task join error: {}", e)))?
    }
}

fn transport_error(err: ureq::Error) -> LlmError {
    match err {
        ureq::Error::StatusCode(status) => LlmError::Api {
            status,
            message: "request rejected".to_string(),
        },
        other => LlmError::Network(other.to_string()),
    }
}
