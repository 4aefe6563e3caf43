//! Expense persistence port
//!
//! Command-style interface keyed by named operations. Any implementation
//! satisfying these operation semantics is conformant; Postgres and
//! in-memory backends are provided.

pub mod postgres;

pub use postgres::PgExpenseStore;

use crate::demo;
use crate::models::{
    Category, CreateExpenseRequest, Expense, ExpenseStatus, UpdateExpenseRequest, User,
};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for expense persistence
#[async_trait::async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Expense>>;
    async fn get_by_id(&self, expense_id: i64) -> Result<Option<Expense>>;
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Expense>>;
    async fn list_pending(&self) -> Result<Vec<Expense>>;
    async fn search(&self, term: &str) -> Result<Vec<Expense>>;
    async fn create(&self, request: &CreateExpenseRequest) -> Result<i64>;
    async fn update(&self, request: &UpdateExpenseRequest) -> Result<bool>;
    async fn submit(&self, expense_id: i64) -> Result<bool>;
    async fn approve(&self, expense_id: i64, reviewer_id: i64) -> Result<bool>;
    async fn reject(&self, expense_id: i64, reviewer_id: i64) -> Result<bool>;
    async fn delete(&self, expense_id: i64) -> Result<bool>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn list_statuses(&self) -> Result<Vec<ExpenseStatus>>;
}

struct MemoryInner {
    expenses: HashMap<i64, Expense>,
    next_id: i64,
}

/// In-memory expense store for development and tests.
///
/// Enforces the same transition gating the SQL backend expresses in its
/// WHERE clauses: an illegal transition returns false and mutates nothing.
pub struct InMemoryExpenseStore {
    inner: RwLock<MemoryInner>,
    categories: Vec<Category>,
    users: Vec<User>,
}

impl InMemoryExpenseStore {
    pub fn new() -> Self {
        Self::with_reference_data(demo::demo_categories(), demo::demo_users())
    }

    pub fn with_reference_data(categories: Vec<Category>, users: Vec<User>) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                expenses: HashMap::new(),
                next_id: 1,
            }),
            categories,
            users,
        }
    }

    fn category_name(&self, category_id: i64) -> String {
        self.categories
            .iter()
            .find(|c| c.category_id == category_id)
            .map(|c| c.category_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn user(&self, user_id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }
}

impl Default for InMemoryExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExpenseStore for InMemoryExpenseStore {

    async fn list_all(&self) -> Result<Vec<Expense>> {
        let inner = self.inner.read().await;
        let mut expenses: Vec<Expense> = inner.expenses.values().cloned().collect();
        expenses.sort_by_key(|e| e.expense_id);
        Ok(expenses)
    }

    async fn get_by_id(&self, expense_id: i64) -> Result<Option<Expense>> {
        let inner = self.inner.read().await;
        Ok(inner.expenses.get(&expense_id).cloned())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Expense>> {
        let inner = self.inner.read().await;
        let mut expenses: Vec<Expense> = inner
            .expenses
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.expense_id);
        Ok(expenses)
    }

    async fn list_pending(&self) -> Result<Vec<Expense>> {
        let inner = self.inner.read().await;
        let mut expenses: Vec<Expense> = inner
            .expenses
            .values()
            .filter(|e| e.status == ExpenseStatus::Submitted)
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.expense_id);
        Ok(expenses)
    }

    async fn search(&self, term: &str) -> Result<Vec<Expense>> {
        let needle = term.to_lowercase();
        let inner = self.inner.read().await;
        let mut expenses: Vec<Expense> = inner
            .expenses
            .values()
            .filter(|e| {
                e.description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                    || e.category_name.to_lowercase().contains(&needle)
                    || e.user_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.expense_id);
        Ok(expenses)
    }

    async fn create(&self, request: &CreateExpenseRequest) -> Result<i64> {
        let (user_name, email) = match self.user(request.user_id) {
            Some(user) => (user.user_name.clone(), user.email.clone()),
            None => ("Unknown".to_string(), String::new()),
        };
        let category_name = self.category_name(request.category_id);

        let mut inner = self.inner.write().await;
        let expense_id = inner.next_id;
        inner.next_id += 1;

        let expense = Expense {
            expense_id,
            user_id: request.user_id,
            user_name,
            email,
            category_id: request.category_id,
            category_name,
            status: ExpenseStatus::Draft,
            amount_minor: request.amount_minor(),
            currency: "GBP".to_string(),
            expense_date: request.expense_date,
            description: request.description.clone(),
            receipt_file: request.receipt_file.clone(),
            submitted_at: None,
            reviewed_by: None,
            reviewer_name: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };

        inner.expenses.insert(expense_id, expense);
        Ok(expense_id)
    }

    async fn update(&self, request: &UpdateExpenseRequest) -> Result<bool> {
        let category_name = self.category_name(request.category_id);

        let mut inner = self.inner.write().await;
        let Some(expense) = inner.expenses.get_mut(&request.expense_id) else {
            return Ok(false);
        };
        if !expense.status.is_editable() {
            return Ok(false);
        }

        expense.category_id = request.category_id;
        expense.category_name = category_name;
        expense.amount_minor = request.amount_minor();
        expense.expense_date = request.expense_date;
        expense.description = request.description.clone();
        expense.receipt_file = request.receipt_file.clone();
        Ok(true)
    }

    async fn submit(&self, expense_id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(expense) = inner.expenses.get_mut(&expense_id) else {
            return Ok(false);
        };
        if !expense.status.can_submit() {
            return Ok(false);
        }

        expense.status = ExpenseStatus::Submitted;
        expense.submitted_at = Some(Utc::now());
        Ok(true)
    }

    async fn approve(&self, expense_id: i64, reviewer_id: i64) -> Result<bool> {
        self.review(expense_id, reviewer_id, ExpenseStatus::Approved)
            .await
    }

    async fn reject(&self, expense_id: i64, reviewer_id: i64) -> Result<bool> {
        self.review(expense_id, reviewer_id, ExpenseStatus::Rejected)
            .await
    }

    async fn delete(&self, expense_id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(expense) = inner.expenses.get(&expense_id) else {
            return Ok(false);
        };
        if !expense.status.is_editable() {
            return Ok(false);
        }

        inner.expenses.remove(&expense_id);
        Ok(true)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }

    async fn list_statuses(&self) -> Result<Vec<ExpenseStatus>> {
        Ok(ExpenseStatus::ALL.to_vec())
    }
}

impl InMemoryExpenseStore {
    async fn review(&self, expense_id: i64, reviewer_id: i64, verdict: ExpenseStatus) -> Result<bool> {
        let reviewer_name = self.user(reviewer_id).map(|u| u.user_name.clone());

        let mut inner = self.inner.write().await;
        let Some(expense) = inner.expenses.get_mut(&expense_id) else {
            return Ok(false);
        };
        if !expense.status.can_review() {
            return Ok(false);
        }

        expense.status = verdict;
        expense.reviewed_by = Some(reviewer_id);
        expense.reviewer_name = reviewer_name;
        expense.reviewed_at = Some(Utc::now());
        Ok(true)
    }
}
