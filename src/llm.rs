/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/llm.rs
 * Responsibility: Conversation message types and the Gemini model client.
 */

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    ToolResult,
}

impl MessageRole {
    fn gemini_role(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
            // Function responses travel as user content in Gemini.
            MessageRole::ToolResult => "user",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub parts: Vec<MultimodalPart>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MultimodalPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    pub function_response: Option<Value>,
    /// Opaque signature Gemini attaches to thinking turns; must be echoed back.
    #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    /// Anything else the model sent, kept so the turn is replayed verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MultimodalPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(name: &str, args: Value) -> Self {
        Self {
            function_call: Some(json!({ "name": name, "args": args })),
            ..Self::default()
        }
    }

    pub fn function_response(name: &str, response: Value, id: Option<&str>) -> Self {
        let mut payload = json!({ "name": name, "response": response });
        if let Some(id) = id {
            payload["id"] = json!(id);
        }
        Self {
            function_response: Some(payload),
            ..Self::default()
        }
    }
}

/// A raw tool call as the model produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: Option<String>,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Plain answer, no tool calls.
    Narrative { text: String, parts: Vec<MultimodalPart> },
    ToolCalls {
        thought: Option<String>,
        calls: Vec<ToolCallRequest>,
        parts: Vec<MultimodalPart>,
    },
}

impl ModelTurn {
    /// The parts exactly as the model returned them.
    pub fn parts(&self) -> &[MultimodalPart] {
        match self {
            ModelTurn::Narrative { parts, .. } | ModelTurn::ToolCalls { parts, .. } => parts,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub turn: ModelTurn,
    pub usage: TokenUsage,
}

/// The remote model the agent loop talks to.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate_turn(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &Value,
    ) -> Result<ModelResponse, LlmError>;
}

/// Gemini `generateContent` over HTTPS.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
        temperature: Option<f32>,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("confine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate_turn(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &Value,
    ) -> Result<ModelResponse, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let payload = build_payload(system_prompt, history, tools, self.temperature);
        debug!(model = %self.model, messages = history.len(), "Sending generateContent request");

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await?;
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        parse_response(&body)
    }
}

/// Build the request body. Consecutive tool results are merged so parallel
/// function responses share one turn.
pub fn build_payload(
    system_prompt: &str,
    history: &[Message],
    tools: &Value,
    temperature: Option<f32>,
) -> Value {
    let mut contents: Vec<(MessageRole, Vec<&MultimodalPart>)> = Vec::new();
    for message in history {
        if message.role == MessageRole::ToolResult {
            if let Some((MessageRole::ToolResult, parts)) = contents.last_mut() {
                parts.extend(message.parts.iter());
                continue;
            }
        }
        contents.push((message.role, message.parts.iter().collect()));
    }

    let contents: Vec<Value> = contents
        .into_iter()
        .map(|(role, parts)| json!({ "role": role.gemini_role(), "parts": parts }))
        .collect();

    let mut payload = json!({
        "systemInstruction": {
            "parts": [{ "text": system_prompt }]
        },
        "contents": contents,
    });

    if tools.as_array().is_some_and(|t| !t.is_empty()) {
        payload["tools"] = json!([{ "functionDeclarations": tools }]);
    }
    if let Some(temperature) = temperature {
        payload["generationConfig"] = json!({ "temperature": temperature });
    }

    payload
}

/// Turn a `generateContent` response body into a [`ModelResponse`].
pub fn parse_response(body: &Value) -> Result<ModelResponse, LlmError> {
    let usage = TokenUsage {
        prompt_tokens: body["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
        response_tokens: body["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0),
    };

    let raw_parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut parts = Vec::with_capacity(raw_parts.len());
    let mut text_acc = String::new();
    let mut calls = Vec::new();

    for raw in raw_parts {
        let part: MultimodalPart = serde_json::from_value(raw)?;
        if let Some(text) = part.text.as_deref() {
            text_acc.push_str(text);
        }
        if let Some(call) = part.function_call.as_ref() {
            let name = call["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse(format!("functionCall without a name: {}", call)))?;
            calls.push(ToolCallRequest {
                id: call["id"].as_str().map(str::to_string),
                name: name.to_string(),
                args: call.get("args").cloned().unwrap_or(Value::Null),
            });
        }
        parts.push(part);
    }

    let turn = if !calls.is_empty() {
        let thought = Some(text_acc.trim().to_string()).filter(|t| !t.is_empty());
        ModelTurn::ToolCalls { thought, calls, parts }
    } else if !text_acc.is_empty() {
        ModelTurn::Narrative { text: text_acc, parts }
    } else {
        let reason = body["candidates"][0]["finishReason"].as_str().unwrap_or("UNKNOWN");
        let message = if reason == "SAFETY" {
            "Gemini blocked the response due to SAFETY filters".to_string()
        } else {
            format!("Gemini returned no content. Finish reason: {}", reason)
        };
        warn!(finish_reason = %reason, "Model returned an empty turn");
        return Err(LlmError::InvalidResponse(message));
    };

    Ok(ModelResponse { turn, usage })
}
