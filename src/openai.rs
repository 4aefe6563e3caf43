//! OpenAI-compatible chat backend
//!
//! Talks the chat-completions wire format with function tools.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::backend::{ChatRole, Message, ModelBackend, ModelTurn, ToolCallRequest, ToolSpec};
use crate::error::ExpenseError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Build from OPENAI_ENDPOINT / OPENAI_API_KEY / OPENAI_DEPLOYMENT.
    /// Returns None when endpoint or credentials are missing — the caller
    /// falls back to the deterministic responder.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("OPENAI_ENDPOINT").ok()?;
        let api_key = env::var("OPENAI_API_KEY").ok()?;
        if endpoint.trim().is_empty() || api_key.trim().is_empty() {
            return None;
        }

        let model = env::var("OPENAI_DEPLOYMENT").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        info!("Chat backend configured with endpoint: {}", endpoint);
        Some(Self::new(endpoint, api_key, model))
    }
}

#[async_trait::async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> crate::Result<ModelTurn> {
        let url = format!("{}/chat/completions", self.endpoint);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(WireTool::from).collect(),
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat backend request failed: {}", e);
                ExpenseError::BackendError(format!("Chat backend request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat backend error response ({}): {}", status, error_text);
            return Err(ExpenseError::BackendError(format!(
                "Chat backend returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat backend response: {}", e);
            ExpenseError::BackendError(format!("Chat backend parse error: {}", e))
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            ExpenseError::BackendError("Chat backend returned no choices".to_string())
        })?;

        Ok(model_turn_from_choice(choice))
    }
}

fn model_turn_from_choice(choice: Choice) -> ModelTurn {
    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        return ModelTurn::ToolCalls(
            tool_calls
                .into_iter()
                .map(|call| ToolCallRequest {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        );
    }

    ModelTurn::Answer(choice.message.content.unwrap_or_default())
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };

        Self {
            role,
            content: message.content.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function",
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunctionSpec {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: WireFunctionCall,
}
