//! Model backend abstraction
//!
//! A backend accepts a conversation plus a tool manifest and answers with
//! either final text or a set of requested tool invocations. The scripted
//! implementation keeps the assistant testable without a live model.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model. The id correlates the tool's
/// result back into the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_calls,
        }
    }

    /// Result of one tool call, correlated by the request id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// One entry of the tool manifest handed to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// What the model did with the conversation.
#[derive(Debug, Clone)]
pub enum ModelTurn {
    Answer(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// Trait for model backends (the only LLM seam in the crate)
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn>;
}

/// Scripted backend for development and testing.
///
/// Replays a fixed sequence of turns and records every conversation it is
/// shown, so loop behavior can be asserted without a live model.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ModelTurn>>,
    observed: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Conversations received so far, in call order.
    pub async fn observed(&self) -> Vec<Vec<Message>> {
        self.observed.lock().await.clone()
    }

    pub async fn calls_made(&self) -> usize {
        self.observed.lock().await.len()
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<ModelTurn> {
        self.observed.lock().await.push(messages.to_vec());

        self.script
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| {
                crate::error::ExpenseError::BackendError("scripted backend exhausted".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_backend_replays_in_order() {
        let backend = ScriptedBackend::new(vec![
            ModelTurn::ToolCalls(vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "get_categories".to_string(),
                arguments: "{}".to_string(),
            }]),
            ModelTurn::Answer("done".to_string()),
        ]);

        let messages = vec![Message::user("hello")];
        match backend.complete(&messages, &[]).await.unwrap() {
            ModelTurn::ToolCalls(calls) => assert_eq!(calls[0].name, "get_categories"),
            ModelTurn::Answer(_) => panic!("expected tool calls"),
        }
        match backend.complete(&messages, &[]).await.unwrap() {
            ModelTurn::Answer(text) => assert_eq!(text, "done"),
            ModelTurn::ToolCalls(_) => panic!("expected answer"),
        }

        // script exhausted → error
        assert!(backend.complete(&messages, &[]).await.is_err());
        assert_eq!(backend.calls_made().await, 3);
    }
}
