//! Assistant tool trait and registry
//!
//! Each tool maps 1:1 onto an expense lifecycle operation. Tool results
//! are strings fed straight back into the model conversation.

use crate::backend::ToolSpec;
use crate::error::ExpenseError;
use crate::models::Expense;
use crate::service::ExpenseService;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Caller-supplied identity threaded into review tools. The core embeds no
/// default reviewer; whoever drives the assistant names one.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    pub reviewer_id: i64,
}

/// Trait for a single assistant tool
#[async_trait::async_trait]
pub trait ExpenseTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Option<Value> {
        None
    }
    async fn execute(&self, arguments: &Value, ctx: &ToolContext) -> Result<String>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ExpenseTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn ExpenseTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExpenseTool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Tool manifest handed to the model backend.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str_arg(arguments: &Value, key: &str) -> Result<String> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ExpenseError::InvalidToolInput(format!("Expected string '{}' in tool arguments", key))
        })
}

fn require_id_arg(arguments: &Value, key: &str) -> Result<i64> {
    let id = arguments.get(key).and_then(|v| v.as_i64()).ok_or_else(|| {
        ExpenseError::InvalidToolInput(format!("Expected integer '{}' in tool arguments", key))
    })?;

    if id <= 0 {
        return Err(ExpenseError::InvalidToolInput(format!(
            "Invalid expense ID: {}",
            id
        )));
    }
    Ok(id)
}

/// Compact projection the model sees instead of the full entity.
fn project_expenses(expenses: &[Expense], include_status: bool) -> Value {
    Value::Array(
        expenses
            .iter()
            .map(|e| {
                let mut entry = json!({
                    "expenseId": e.expense_id,
                    "date": e.formatted_date(),
                    "category": e.category_name,
                    "amount": e.formatted_amount(),
                    "description": e.description,
                    "user": e.user_name,
                });
                if include_status {
                    entry["status"] = json!(e.status.to_string());
                }
                entry
            })
            .collect(),
    )
}

pub struct GetAllExpensesTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for GetAllExpensesTool {
    fn name(&self) -> &'static str {
        "get_all_expenses"
    }

    fn description(&self) -> &'static str {
        "Retrieves all expenses from the database"
    }

    async fn execute(&self, _arguments: &Value, _ctx: &ToolContext) -> Result<String> {
        let outcome = self.service.list_all().await;
        Ok(project_expenses(&outcome.data, true).to_string())
    }
}

pub struct GetPendingExpensesTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for GetPendingExpensesTool {
    fn name(&self) -> &'static str {
        "get_pending_expenses"
    }

    fn description(&self) -> &'static str {
        "Retrieves all pending expenses awaiting approval"
    }

    async fn execute(&self, _arguments: &Value, _ctx: &ToolContext) -> Result<String> {
        let outcome = self.service.list_pending().await;
        Ok(project_expenses(&outcome.data, false).to_string())
    }
}

pub struct GetCategoriesTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for GetCategoriesTool {
    fn name(&self) -> &'static str {
        "get_categories"
    }

    fn description(&self) -> &'static str {
        "Retrieves all expense categories"
    }

    async fn execute(&self, _arguments: &Value, _ctx: &ToolContext) -> Result<String> {
        let outcome = self.service.list_categories().await;
        Ok(serde_json::to_string(&outcome.data)?)
    }
}

pub struct SearchExpensesTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for SearchExpensesTool {
    fn name(&self) -> &'static str {
        "search_expenses"
    }

    fn description(&self) -> &'static str {
        "Searches expenses by description, category, or user name"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "searchTerm": {
                    "type": "string",
                    "description": "The search term to find expenses"
                }
            },
            "required": ["searchTerm"]
        }))
    }

    async fn execute(&self, arguments: &Value, _ctx: &ToolContext) -> Result<String> {
        let term = require_str_arg(arguments, "searchTerm")?;
        let outcome = self.service.search(&term).await;
        Ok(project_expenses(&outcome.data, true).to_string())
    }
}

pub struct ApproveExpenseTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for ApproveExpenseTool {
    fn name(&self) -> &'static str {
        "approve_expense"
    }

    fn description(&self) -> &'static str {
        "Approves an expense (manager action)"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "expenseId": {
                    "type": "integer",
                    "description": "The ID of the expense to approve"
                }
            },
            "required": ["expenseId"]
        }))
    }

    async fn execute(&self, arguments: &Value, ctx: &ToolContext) -> Result<String> {
        let expense_id = require_id_arg(arguments, "expenseId")?;
        let approved = self.service.approve(expense_id, ctx.reviewer_id).await;
        Ok(if approved {
            "Expense approved successfully.".to_string()
        } else {
            "Failed to approve expense.".to_string()
        })
    }
}

pub struct RejectExpenseTool {
    service: Arc<ExpenseService>,
}

#[async_trait::async_trait]
impl ExpenseTool for RejectExpenseTool {
    fn name(&self) -> &'static str {
        "reject_expense"
    }

    fn description(&self) -> &'static str {
        "Rejects an expense (manager action)"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "expenseId": {
                    "type": "integer",
                    "description": "The ID of the expense to reject"
                }
            },
            "required": ["expenseId"]
        }))
    }

    async fn execute(&self, arguments: &Value, ctx: &ToolContext) -> Result<String> {
        let expense_id = require_id_arg(arguments, "expenseId")?;
        let rejected = self.service.reject(expense_id, ctx.reviewer_id).await;
        Ok(if rejected {
            "Expense rejected successfully.".to_string()
        } else {
            "Failed to reject expense.".to_string()
        })
    }
}

/// Registry with the six expense tools the assistant exposes.
pub fn create_expense_tools(service: Arc<ExpenseService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(GetAllExpensesTool {
        service: Arc::clone(&service),
    }));
    registry.register(Arc::new(GetPendingExpensesTool {
        service: Arc::clone(&service),
    }));
    registry.register(Arc::new(GetCategoriesTool {
        service: Arc::clone(&service),
    }));
    registry.register(Arc::new(SearchExpensesTool {
        service: Arc::clone(&service),
    }));
    registry.register(Arc::new(ApproveExpenseTool {
        service: Arc::clone(&service),
    }));
    registry.register(Arc::new(RejectExpenseTool { service }));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateExpenseRequest;
    use crate::store::InMemoryExpenseStore;
    use chrono::NaiveDate;

    fn demo_registry() -> ToolRegistry {
        create_expense_tools(Arc::new(ExpenseService::demo()))
    }

    #[test]
    fn test_registry_exposes_exactly_six_tools() {
        let registry = demo_registry();
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "approve_expense",
                "get_all_expenses",
                "get_categories",
                "get_pending_expenses",
                "reject_expense",
                "search_expenses",
            ]
        );
        assert_eq!(registry.specs().len(), 6);
        assert!(registry.get("create_expense").is_none());
    }

    #[tokio::test]
    async fn test_search_tool_projects_matches() {
        let registry = demo_registry();
        let tool = registry.get("search_expenses").unwrap();
        let ctx = ToolContext { reviewer_id: 2 };

        let result = tool
            .execute(&json!({"searchTerm": "travel"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("Travel"));
        assert!(result.contains("£120.00"));

        // missing argument is an input error, not a panic
        assert!(tool.execute(&json!({}), &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_approve_tool_uses_context_reviewer() {
        let service = Arc::new(ExpenseService::with_store(Arc::new(
            InMemoryExpenseStore::new(),
        )));
        let registry = create_expense_tools(Arc::clone(&service));

        let id = service
            .create(&CreateExpenseRequest {
                user_id: 1,
                category_id: 1,
                amount: 10.0,
                expense_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                description: None,
                receipt_file: None,
            })
            .await;
        service.submit(id).await;

        let tool = registry.get("approve_expense").unwrap();
        let ctx = ToolContext { reviewer_id: 2 };
        let result = tool
            .execute(&json!({"expenseId": id}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Expense approved successfully.");

        let expense = service.get_by_id(id).await.data.unwrap();
        assert_eq!(expense.reviewed_by, Some(2));

        // draft/terminal expenses cannot be approved
        let result = tool
            .execute(&json!({"expenseId": id}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Failed to approve expense.");
    }

    #[tokio::test]
    async fn test_id_argument_validation() {
        let registry = demo_registry();
        let tool = registry.get("reject_expense").unwrap();
        let ctx = ToolContext { reviewer_id: 2 };

        assert!(tool.execute(&json!({"expenseId": 0}), &ctx).await.is_err());
        assert!(tool
            .execute(&json!({"expenseId": "four"}), &ctx)
            .await
            .is_err());
    }
}
