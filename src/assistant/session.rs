//! Tool-loop state machine
//!
//! The conversation loop is modeled as explicit states with a pure
//! transition function, so the iteration bound is testable without a
//! live model backend.

use crate::backend::{ModelTurn, ToolCallRequest};

/// Hard cap on model turns per exchange. The loop never makes a sixth
/// backend call, whatever the model keeps requesting.
pub const MAX_TOOL_ITERATIONS: usize = 5;

#[derive(Debug, Clone)]
pub enum LoopState {
    /// Next step is a model backend call.
    AwaitingModel,
    /// The model requested tool calls; execute them and go around again.
    ExecutingTools(Vec<ToolCallRequest>),
    /// The model produced a final answer.
    Done(String),
    /// The iteration budget ran out without a final answer.
    Exhausted,
}

/// Fold one model turn into the next state. `iterations_used` counts model
/// turns consumed so far, including the one being folded. A tool-call turn
/// that lands on the budget boundary exhausts the loop rather than
/// spending tool work the model can never observe.
pub fn advance(turn: ModelTurn, iterations_used: usize) -> LoopState {
    match turn {
        ModelTurn::Answer(text) => LoopState::Done(text),
        ModelTurn::ToolCalls(_) if iterations_used >= MAX_TOOL_ITERATIONS => LoopState::Exhausted,
        ModelTurn::ToolCalls(calls) => LoopState::ExecutingTools(calls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_calls() -> ModelTurn {
        ModelTurn::ToolCalls(vec![ToolCallRequest {
            id: "call_1".to_string(),
            name: "get_all_expenses".to_string(),
            arguments: "{}".to_string(),
        }])
    }

    #[test]
    fn test_answer_is_done_at_any_iteration() {
        for iteration in 1..=MAX_TOOL_ITERATIONS {
            match advance(ModelTurn::Answer("hi".to_string()), iteration) {
                LoopState::Done(text) => assert_eq!(text, "hi"),
                other => panic!("expected Done, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_tool_calls_below_budget_execute() {
        for iteration in 1..MAX_TOOL_ITERATIONS {
            match advance(tool_calls(), iteration) {
                LoopState::ExecutingTools(calls) => assert_eq!(calls.len(), 1),
                other => panic!("expected ExecutingTools, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_tool_calls_on_budget_boundary_exhaust() {
        match advance(tool_calls(), MAX_TOOL_ITERATIONS) {
            LoopState::Exhausted => {}
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }
}
