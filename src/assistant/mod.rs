//! Chat assistant - drives the bounded tool-calling loop
//!
//! Turns a free-text message into a free-text response, consulting the
//! expense lifecycle manager through the fixed tool set. Never returns an
//! error to the caller: unconfigured backends fall back to the
//! deterministic responder, and any failure during the exchange surfaces
//! as an apologetic text message.

pub mod session;

use crate::backend::{Message, ModelBackend, ToolCallRequest};
use crate::fallback;
use crate::openai::OpenAiBackend;
use crate::service::ExpenseService;
use crate::tools::{create_expense_tools, ToolContext, ToolRegistry};
use crate::Result;
use serde_json::{json, Value};
use session::{LoopState, MAX_TOOL_ITERATIONS};
use std::sync::Arc;
use tracing::{error, info, warn};

const SYSTEM_PROMPT: &str = r#"You are a helpful expense management assistant. You can help users:
- View and search expenses
- Check pending approvals
- Approve or reject expenses (as a manager)
- Get information about expense categories

When listing expenses, format them nicely with:
- Date
- Category
- Amount (in GBP)
- Status
- Description

Use the available functions to interact with the expense database.
Always be helpful and provide clear, formatted responses."#;

const EXHAUSTED_RESPONSE: &str =
    "I apologize, but I couldn't complete your request. Please try again.";

pub struct ChatAssistant {
    backend: Option<Arc<dyn ModelBackend>>,
    tools: ToolRegistry,
}

impl ChatAssistant {
    pub fn new(backend: Option<Arc<dyn ModelBackend>>, service: Arc<ExpenseService>) -> Self {
        Self {
            backend,
            tools: create_expense_tools(service),
        }
    }

    /// Backend from OPENAI_* environment; unconfigured means fallback-only.
    pub fn from_env(service: Arc<ExpenseService>) -> Self {
        let backend = OpenAiBackend::from_env()
            .map(|backend| Arc::new(backend) as Arc<dyn ModelBackend>);

        if backend.is_none() {
            warn!("Chat backend not configured. Chat will return fallback responses.");
        }

        Self::new(backend, service)
    }

    /// Whether a model backend is usable. Consumed by callers for UI
    /// messaging ("AI enabled" banner).
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Answer a single user message. `reviewer_id` is the identity used
    /// when the model approves or rejects through a tool — always supplied
    /// by the caller, never baked in here.
    pub async fn respond(&self, message: &str, reviewer_id: i64) -> String {
        let Some(backend) = &self.backend else {
            return fallback::respond(message);
        };

        match self
            .drive_loop(backend.as_ref(), message, reviewer_id)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                error!("Chat exchange failed: {}", e);
                format!("I encountered an error processing your request: {}", e)
            }
        }
    }

    async fn drive_loop(
        &self,
        backend: &dyn ModelBackend,
        message: &str,
        reviewer_id: i64,
    ) -> Result<String> {
        let specs = self.tools.specs();
        let ctx = ToolContext { reviewer_id };

        // One system prompt + one user message per exchange; no multi-turn
        // history is persisted across calls.
        let mut messages = vec![Message::system(SYSTEM_PROMPT), Message::user(message)];

        let mut state = LoopState::AwaitingModel;
        let mut iterations = 0usize;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    iterations += 1;
                    let turn = backend.complete(&messages, &specs).await?;
                    session::advance(turn, iterations)
                }
                LoopState::ExecutingTools(calls) => {
                    info!(
                        iteration = iterations,
                        tool_count = calls.len(),
                        "Executing requested tool calls"
                    );

                    messages.push(Message::assistant_tool_calls(calls.clone()));
                    for call in &calls {
                        let result = self.run_tool(call, &ctx).await;
                        messages.push(Message::tool_result(call.id.clone(), result));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => return Ok(answer),
                LoopState::Exhausted => {
                    warn!("Tool loop exhausted after {} iterations", iterations);
                    return Ok(EXHAUSTED_RESPONSE.to_string());
                }
            };
        }
    }

    /// Execute one requested tool call. Failures are isolated: the error
    /// becomes this tool's textual result and the loop continues.
    async fn run_tool(&self, call: &ToolCallRequest, ctx: &ToolContext) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("Unknown tool requested: {}", call.name);
            return format!("Unknown function: {}", call.name);
        };

        let arguments: Value = if call.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(&call.arguments) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Malformed arguments for {}: {}", call.name, e);
                    return format!("Error executing {}: {}", call.name, e);
                }
            }
        };

        match tool.execute(&arguments, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool execution failed: {}: {}", call.name, e);
                format!("Error executing {}: {}", call.name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatRole, ModelTurn, ScriptedBackend};
    use crate::models::CreateExpenseRequest;
    use crate::store::InMemoryExpenseStore;
    use chrono::NaiveDate;

    fn memory_service() -> Arc<ExpenseService> {
        Arc::new(ExpenseService::with_store(Arc::new(
            InMemoryExpenseStore::new(),
        )))
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_uses_fallback() {
        let assistant = ChatAssistant::new(None, memory_service());
        assert!(!assistant.is_configured());

        let response = assistant.respond("show me all expenses", 2).await;
        assert!(response.starts_with("**Expense List**"));
    }

    #[tokio::test]
    async fn test_pending_question_makes_one_tool_call() {
        let service = memory_service();
        let id = service
            .create(&CreateExpenseRequest {
                user_id: 1,
                category_id: 1,
                amount: 55.00,
                expense_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                description: Some("Conference travel".to_string()),
                receipt_file: None,
            })
            .await;
        service.submit(id).await;

        let backend = Arc::new(ScriptedBackend::new(vec![
            ModelTurn::ToolCalls(vec![tool_call("call_1", "get_pending_expenses", "{}")]),
            ModelTurn::Answer("There is 1 pending expense.".to_string()),
        ]));
        let assistant = ChatAssistant::new(
            Some(backend.clone() as Arc<dyn ModelBackend>),
            service,
        );
        assert!(assistant.is_configured());

        let response = assistant.respond("what expenses are pending?", 2).await;
        assert_eq!(response, "There is 1 pending expense.");
        assert_eq!(backend.calls_made().await, 2);

        // the second conversation carries exactly one tool result, and it
        // contains the pending expense
        let observed = backend.observed().await;
        let tool_messages: Vec<_> = observed[1]
            .iter()
            .filter(|m| m.role == ChatRole::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 1);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert!(tool_messages[0].content.contains("Conference travel"));
    }

    #[tokio::test]
    async fn test_loop_exhausts_after_five_model_turns() {
        let turns: Vec<ModelTurn> = (0..MAX_TOOL_ITERATIONS)
            .map(|i| {
                ModelTurn::ToolCalls(vec![tool_call(
                    &format!("call_{}", i),
                    "get_categories",
                    "{}",
                )])
            })
            .collect();
        let backend = Arc::new(ScriptedBackend::new(turns));
        let assistant = ChatAssistant::new(
            Some(backend.clone() as Arc<dyn ModelBackend>),
            memory_service(),
        );

        let response = assistant.respond("keep going forever", 2).await;
        assert_eq!(response, EXHAUSTED_RESPONSE);
        // the budget is five model calls; no sixth call is made
        assert_eq!(backend.calls_made().await, MAX_TOOL_ITERATIONS);
    }

    #[tokio::test]
    async fn test_tool_failure_is_isolated() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ModelTurn::ToolCalls(vec![
                tool_call("call_1", "approve_expense", r#"{"wrong":"args"}"#),
                tool_call("call_2", "get_categories", "{}"),
            ]),
            ModelTurn::Answer("Approval failed, but here are the categories.".to_string()),
        ]));
        let assistant = ChatAssistant::new(
            Some(backend.clone() as Arc<dyn ModelBackend>),
            memory_service(),
        );

        let response = assistant.respond("approve something", 2).await;
        assert_eq!(response, "Approval failed, but here are the categories.");

        let observed = backend.observed().await;
        let tool_messages: Vec<_> = observed[1]
            .iter()
            .filter(|m| m.role == ChatRole::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert!(tool_messages[0]
            .content
            .starts_with("Error executing approve_expense"));
        assert!(tool_messages[1].content.contains("Travel"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_text_result() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ModelTurn::ToolCalls(vec![tool_call("call_1", "delete_everything", "{}")]),
            ModelTurn::Answer("I can't do that.".to_string()),
        ]));
        let assistant = ChatAssistant::new(
            Some(backend.clone() as Arc<dyn ModelBackend>),
            memory_service(),
        );

        let response = assistant.respond("wipe the database", 2).await;
        assert_eq!(response, "I can't do that.");

        let observed = backend.observed().await;
        let tool_message = observed[1]
            .iter()
            .find(|m| m.role == ChatRole::Tool)
            .unwrap();
        assert_eq!(tool_message.content, "Unknown function: delete_everything");
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_text() {
        // empty script: the very first backend call errors
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let assistant = ChatAssistant::new(
            Some(backend as Arc<dyn ModelBackend>),
            memory_service(),
        );

        let response = assistant.respond("hello", 2).await;
        assert!(response.starts_with("I encountered an error processing your request"));
        assert!(response.contains("scripted backend exhausted"));
    }
}
