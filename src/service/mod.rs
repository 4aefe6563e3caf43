//! Expense lifecycle manager
//!
//! Enforces the expense state machine and provides query operations,
//! independent of how data is stored. Store failures never escape: reads
//! degrade to the static demo datasets, writes fail with a plain
//! boolean/sentinel, and the most recent failure is kept in a diagnostic
//! slot (overwritten per call, cleared on success).

use crate::demo;
use crate::models::{
    Category, CreateExpenseRequest, Expense, ExpenseStatus, UpdateExpenseRequest, User,
};
use crate::store::{ExpenseStore, InMemoryExpenseStore, PgExpenseStore};
use std::env;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Result of a read operation: the data plus the diagnostic that produced
/// it, if the call degraded to fallback data. Callers never need to reach
/// into the store to learn why a read was degraded.
#[derive(Debug, Clone)]
pub struct ReadOutcome<T> {
    pub data: T,
    pub diagnostic: Option<String>,
}

impl<T> ReadOutcome<T> {
    fn ok(data: T) -> Self {
        Self {
            data,
            diagnostic: None,
        }
    }

    fn degraded(data: T, diagnostic: String) -> Self {
        Self {
            data,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }
}

const NO_STORE_DIAGNOSTIC: &str =
    "Database connection not configured. Serving demo data.";

pub struct ExpenseService {
    store: Option<Arc<dyn ExpenseStore>>,
    last_diagnostic: RwLock<Option<String>>,
}

impl ExpenseService {
    pub fn with_store(store: Arc<dyn ExpenseStore>) -> Self {
        Self {
            store: Some(store),
            last_diagnostic: RwLock::new(None),
        }
    }

    /// Demo mode: no persistence port at all. Reads serve the static demo
    /// datasets; writes fail with an explanatory diagnostic.
    pub fn demo() -> Self {
        warn!("{}", NO_STORE_DIAGNOSTIC);
        Self {
            store: None,
            last_diagnostic: RwLock::new(Some(NO_STORE_DIAGNOSTIC.to_string())),
        }
    }

    /// Pick a store from the environment: DATABASE_URL selects Postgres,
    /// STORE=memory an in-memory store, neither means demo mode.
    pub fn from_env() -> Self {
        if let Ok(url) = env::var("DATABASE_URL") {
            match PgExpenseStore::connect(&url) {
                Ok(store) => return Self::with_store(Arc::new(store)),
                Err(e) => {
                    warn!("Failed to initialize postgres store, falling back to demo mode: {}", e);
                    return Self::demo();
                }
            }
        }

        if env::var("STORE").map(|v| v == "memory").unwrap_or(false) {
            return Self::with_store(Arc::new(InMemoryExpenseStore::new()));
        }

        Self::demo()
    }

    /// Most recent operation diagnostic, if any. Diagnostic only — a
    /// last-write-wins slot, not synchronized across concurrent callers.
    pub async fn last_diagnostic(&self) -> Option<String> {
        self.last_diagnostic.read().await.clone()
    }

    async fn set_diagnostic(&self, diagnostic: &str) {
        *self.last_diagnostic.write().await = Some(diagnostic.to_string());
    }

    async fn clear_diagnostic(&self) {
        *self.last_diagnostic.write().await = None;
    }

    //
    // ================= Reads =================
    //

    pub async fn list_all(&self) -> ReadOutcome<Vec<Expense>> {
        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo::demo_expenses(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_all().await {
            Ok(expenses) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(expenses)
            }
            Err(e) => {
                let diagnostic = format!("Error listing expenses: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo::demo_expenses(), diagnostic)
            }
        }
    }

    pub async fn get_by_id(&self, expense_id: i64) -> ReadOutcome<Option<Expense>> {
        let demo_lookup =
            || demo::demo_expenses().into_iter().find(|e| e.expense_id == expense_id);

        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo_lookup(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.get_by_id(expense_id).await {
            Ok(expense) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(expense)
            }
            Err(e) => {
                let diagnostic = format!("Error getting expense {}: {}", expense_id, e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo_lookup(), diagnostic)
            }
        }
    }

    pub async fn list_by_user(&self, user_id: i64) -> ReadOutcome<Vec<Expense>> {
        let demo_for_user = || {
            demo::demo_expenses()
                .into_iter()
                .filter(|e| e.user_id == user_id)
                .collect::<Vec<_>>()
        };

        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo_for_user(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_by_user(user_id).await {
            Ok(expenses) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(expenses)
            }
            Err(e) => {
                let diagnostic = format!("Error listing expenses for user {}: {}", user_id, e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo_for_user(), diagnostic)
            }
        }
    }

    pub async fn list_pending(&self) -> ReadOutcome<Vec<Expense>> {
        let demo_pending = || {
            demo::demo_expenses()
                .into_iter()
                .filter(|e| e.status == ExpenseStatus::Submitted)
                .collect::<Vec<_>>()
        };

        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo_pending(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_pending().await {
            Ok(expenses) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(expenses)
            }
            Err(e) => {
                let diagnostic = format!("Error listing pending expenses: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo_pending(), diagnostic)
            }
        }
    }

    /// Case-insensitive substring search over description, category name,
    /// and owner name. Blank-term handling belongs to the caller.
    pub async fn search(&self, term: &str) -> ReadOutcome<Vec<Expense>> {
        let demo_matches = || {
            let needle = term.to_lowercase();
            demo::demo_expenses()
                .into_iter()
                .filter(|e| {
                    e.description
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                        || e.category_name.to_lowercase().contains(&needle)
                        || e.user_name.to_lowercase().contains(&needle)
                })
                .collect::<Vec<_>>()
        };

        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo_matches(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.search(term).await {
            Ok(expenses) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(expenses)
            }
            Err(e) => {
                let diagnostic = format!("Error searching expenses for {:?}: {}", term, e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo_matches(), diagnostic)
            }
        }
    }

    pub async fn list_categories(&self) -> ReadOutcome<Vec<Category>> {
        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo::demo_categories(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_categories().await {
            Ok(categories) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(categories)
            }
            Err(e) => {
                let diagnostic = format!("Error listing categories: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo::demo_categories(), diagnostic)
            }
        }
    }

    pub async fn list_users(&self) -> ReadOutcome<Vec<User>> {
        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo::demo_users(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_users().await {
            Ok(users) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(users)
            }
            Err(e) => {
                let diagnostic = format!("Error listing users: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo::demo_users(), diagnostic)
            }
        }
    }

    pub async fn list_statuses(&self) -> ReadOutcome<Vec<ExpenseStatus>> {
        let Some(store) = &self.store else {
            return ReadOutcome::degraded(demo::demo_statuses(), NO_STORE_DIAGNOSTIC.to_string());
        };

        match store.list_statuses().await {
            Ok(statuses) => {
                self.clear_diagnostic().await;
                ReadOutcome::ok(statuses)
            }
            Err(e) => {
                let diagnostic = format!("Error listing statuses: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                ReadOutcome::degraded(demo::demo_statuses(), diagnostic)
            }
        }
    }

    //
    // ================= Writes =================
    //

    /// Create a new draft expense. Returns the new identifier, or 0 when
    /// the expense could not be created (nothing safe to fabricate for a
    /// write).
    pub async fn create(&self, request: &CreateExpenseRequest) -> i64 {
        if request.amount < 0.0 {
            self.set_diagnostic("Cannot create expense: amount must not be negative.")
                .await;
            return 0;
        }

        let Some(store) = &self.store else {
            self.set_diagnostic("Cannot create expense: no database configured.")
                .await;
            return 0;
        };

        match store.create(request).await {
            Ok(expense_id) => {
                self.clear_diagnostic().await;
                expense_id
            }
            Err(e) => {
                let diagnostic = format!("Error creating expense: {}", e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                0
            }
        }
    }

    /// Edit a draft. Fails without mutating anything when the expense is
    /// absent or no longer a draft.
    pub async fn update(&self, request: &UpdateExpenseRequest) -> bool {
        if request.amount < 0.0 {
            self.set_diagnostic("Cannot update expense: amount must not be negative.")
                .await;
            return false;
        }

        self.write(
            "update",
            request.expense_id,
            |store| {
                let request = request.clone();
                async move { store.update(&request).await }
            },
        )
        .await
    }

    /// Draft → Submitted; sets the submission timestamp exactly once.
    pub async fn submit(&self, expense_id: i64) -> bool {
        self.write("submit", expense_id, |store| async move {
            store.submit(expense_id).await
        })
        .await
    }

    /// Submitted → Approved. Reviewer identity is always caller-supplied.
    pub async fn approve(&self, expense_id: i64, reviewer_id: i64) -> bool {
        self.write("approve", expense_id, |store| async move {
            store.approve(expense_id, reviewer_id).await
        })
        .await
    }

    /// Submitted → Rejected. Reviewer identity is always caller-supplied.
    pub async fn reject(&self, expense_id: i64, reviewer_id: i64) -> bool {
        self.write("reject", expense_id, |store| async move {
            store.reject(expense_id, reviewer_id).await
        })
        .await
    }

    /// Remove a draft. Fails for submitted/reviewed expenses and for
    /// absent identifiers.
    pub async fn delete(&self, expense_id: i64) -> bool {
        self.write("delete", expense_id, |store| async move {
            store.delete(expense_id).await
        })
        .await
    }

    async fn write<F, Fut>(&self, operation: &str, expense_id: i64, run: F) -> bool
    where
        F: FnOnce(Arc<dyn ExpenseStore>) -> Fut,
        Fut: std::future::Future<Output = crate::Result<bool>>,
    {
        let Some(store) = &self.store else {
            self.set_diagnostic(&format!(
                "Cannot {} expense: no database configured.",
                operation
            ))
            .await;
            return false;
        };

        match run(Arc::clone(store)).await {
            Ok(applied) => {
                self.clear_diagnostic().await;
                applied
            }
            Err(e) => {
                let diagnostic =
                    format!("Error running {} for expense {}: {}", operation, expense_id, e);
                error!("{}", diagnostic);
                self.set_diagnostic(&diagnostic).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpenseError;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn create_request() -> CreateExpenseRequest {
        CreateExpenseRequest {
            user_id: 1,
            category_id: 1,
            amount: 120.00,
            expense_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: Some("Taxi from airport".to_string()),
            receipt_file: None,
        }
    }

    /// Delegates to an in-memory store, but fails every operation while
    /// the flag is raised. Lets tests watch the service degrade and
    /// recover.
    struct FlakyStore {
        failing: AtomicBool,
        inner: InMemoryExpenseStore,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                failing: AtomicBool::new(false),
                inner: InMemoryExpenseStore::new(),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> crate::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(ExpenseError::StoreError("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl ExpenseStore for FlakyStore {
        async fn list_all(&self) -> crate::Result<Vec<Expense>> {
            self.check()?;
            self.inner.list_all().await
        }
        async fn get_by_id(&self, expense_id: i64) -> crate::Result<Option<Expense>> {
            self.check()?;
            self.inner.get_by_id(expense_id).await
        }
        async fn list_by_user(&self, user_id: i64) -> crate::Result<Vec<Expense>> {
            self.check()?;
            self.inner.list_by_user(user_id).await
        }
        async fn list_pending(&self) -> crate::Result<Vec<Expense>> {
            self.check()?;
            self.inner.list_pending().await
        }
        async fn search(&self, term: &str) -> crate::Result<Vec<Expense>> {
            self.check()?;
            self.inner.search(term).await
        }
        async fn create(&self, request: &CreateExpenseRequest) -> crate::Result<i64> {
            self.check()?;
            self.inner.create(request).await
        }
        async fn update(&self, request: &UpdateExpenseRequest) -> crate::Result<bool> {
            self.check()?;
            self.inner.update(request).await
        }
        async fn submit(&self, expense_id: i64) -> crate::Result<bool> {
            self.check()?;
            self.inner.submit(expense_id).await
        }
        async fn approve(&self, expense_id: i64, reviewer_id: i64) -> crate::Result<bool> {
            self.check()?;
            self.inner.approve(expense_id, reviewer_id).await
        }
        async fn reject(&self, expense_id: i64, reviewer_id: i64) -> crate::Result<bool> {
            self.check()?;
            self.inner.reject(expense_id, reviewer_id).await
        }
        async fn delete(&self, expense_id: i64) -> crate::Result<bool> {
            self.check()?;
            self.inner.delete(expense_id).await
        }
        async fn list_categories(&self) -> crate::Result<Vec<Category>> {
            self.check()?;
            self.inner.list_categories().await
        }
        async fn list_users(&self) -> crate::Result<Vec<User>> {
            self.check()?;
            self.inner.list_users().await
        }
        async fn list_statuses(&self) -> crate::Result<Vec<ExpenseStatus>> {
            self.check()?;
            self.inner.list_statuses().await
        }
    }

    #[tokio::test]
    async fn test_lifecycle_through_service() {
        let service = ExpenseService::with_store(Arc::new(InMemoryExpenseStore::new()));

        let id = service.create(&create_request()).await;
        assert!(id > 0);

        assert!(service.submit(id).await);
        assert!(!service.submit(id).await);

        assert!(service.approve(id, 2).await);
        let expense = service.get_by_id(id).await.data.unwrap();
        assert_eq!(expense.status, ExpenseStatus::Approved);
        assert_eq!(expense.reviewed_by, Some(2));

        // terminal: no further transitions, no deletion
        assert!(!service.reject(id, 2).await);
        assert!(!service.delete(id).await);
    }

    #[tokio::test]
    async fn test_absent_expense_is_not_an_error() {
        let service = ExpenseService::with_store(Arc::new(InMemoryExpenseStore::new()));
        let outcome = service.get_by_id(42).await;
        assert!(outcome.data.is_none());
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_reads_degrade_to_demo_data_and_recover() {
        let store = Arc::new(FlakyStore::new());
        let service = ExpenseService::with_store(store.clone());

        store.set_failing(true);
        let outcome = service.list_all().await;
        assert_eq!(outcome.data.len(), 4);
        assert!(outcome.is_degraded());
        assert!(service.last_diagnostic().await.is_some());

        store.set_failing(false);
        let outcome = service.list_all().await;
        assert!(outcome.data.is_empty());
        assert!(!outcome.is_degraded());
        assert!(service.last_diagnostic().await.is_none());
    }

    #[tokio::test]
    async fn test_writes_fail_cleanly_when_store_is_down() {
        let store = Arc::new(FlakyStore::new());
        let service = ExpenseService::with_store(store.clone());

        let id = service.create(&create_request()).await;
        assert!(id > 0);

        store.set_failing(true);
        assert_eq!(service.create(&create_request()).await, 0);
        assert!(!service.submit(id).await);
        assert!(service.last_diagnostic().await.is_some());

        store.set_failing(false);
        assert!(service.submit(id).await);
        assert!(service.last_diagnostic().await.is_none());
    }

    #[tokio::test]
    async fn test_demo_mode_serves_demo_reads_and_rejects_writes() {
        let service = ExpenseService::demo();

        let outcome = service.list_all().await;
        assert_eq!(outcome.data.len(), 4);
        assert!(outcome.is_degraded());

        let pending = service.list_pending().await;
        assert!(pending
            .data
            .iter()
            .all(|e| e.status == ExpenseStatus::Submitted));

        let categories = service.list_categories().await;
        assert_eq!(categories.data.len(), 5);

        assert_eq!(service.create(&create_request()).await, 0);
        assert!(!service.approve(1, 2).await);
        assert!(service.last_diagnostic().await.is_some());
    }

    #[tokio::test]
    async fn test_search_matches_category_case_insensitively() {
        let service = ExpenseService::demo();
        let outcome = service.search("travel").await;
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].category_name, "Travel");
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected() {
        let service = ExpenseService::with_store(Arc::new(InMemoryExpenseStore::new()));
        let mut request = create_request();
        request.amount = -5.0;
        assert_eq!(service.create(&request).await, 0);
    }
}
