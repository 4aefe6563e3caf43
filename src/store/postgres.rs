//! Postgres expense store
//!
//! Transition gating lives in the SQL: every write carries its required
//! current status in the WHERE clause, and success means rows_affected > 0.

use crate::models::{
    Category, CreateExpenseRequest, Expense, ExpenseStatus, UpdateExpenseRequest, User,
};
use crate::store::ExpenseStore;
use crate::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

const EXPENSE_SELECT: &str = r#"
    SELECT e.expense_id, e.user_id, u.user_name, u.email,
           e.category_id, c.category_name, e.status_id,
           e.amount_minor, e.currency, e.expense_date, e.description,
           e.receipt_file, e.submitted_at, e.reviewed_by,
           r.user_name AS reviewer_name, e.reviewed_at, e.created_at
    FROM expenses e
    JOIN users u ON u.user_id = e.user_id
    JOIN categories c ON c.category_id = e.category_id
    LEFT JOIN users r ON r.user_id = e.reviewed_by
"#;

pub struct PgExpenseStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgExpenseStore {
    /// Connect lazily; the first operation establishes the connection and
    /// bootstraps the schema.
    pub fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                crate::error::ExpenseError::StoreError(format!(
                    "Failed to initialize postgres pool: {}",
                    e
                ))
            })?;

        info!("Expense store backend: postgres");

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS users (
                      user_id BIGSERIAL PRIMARY KEY,
                      user_name TEXT NOT NULL,
                      email TEXT NOT NULL,
                      role_id BIGINT NOT NULL,
                      role_name TEXT NOT NULL,
                      manager_id BIGINT,
                      is_active BOOLEAN NOT NULL DEFAULT TRUE,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS categories (
                      category_id BIGSERIAL PRIMARY KEY,
                      category_name TEXT NOT NULL,
                      is_active BOOLEAN NOT NULL DEFAULT TRUE
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS expense_statuses (
                      status_id BIGINT PRIMARY KEY,
                      status_name TEXT NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO expense_statuses (status_id, status_name)
                    VALUES (1, 'Draft'), (2, 'Submitted'), (3, 'Approved'), (4, 'Rejected')
                    ON CONFLICT (status_id) DO NOTHING;
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS expenses (
                      expense_id BIGSERIAL PRIMARY KEY,
                      user_id BIGINT NOT NULL REFERENCES users(user_id),
                      category_id BIGINT NOT NULL REFERENCES categories(category_id),
                      status_id BIGINT NOT NULL REFERENCES expense_statuses(status_id),
                      amount_minor BIGINT NOT NULL CHECK (amount_minor >= 0),
                      currency TEXT NOT NULL DEFAULT 'GBP',
                      expense_date DATE NOT NULL,
                      description TEXT,
                      receipt_file TEXT,
                      submitted_at TIMESTAMPTZ,
                      reviewed_by BIGINT REFERENCES users(user_id),
                      reviewed_at TIMESTAMPTZ,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_expenses_user ON expenses (user_id);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                crate::error::ExpenseError::StoreError(format!(
                    "Failed to initialize expense schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

}

fn store_err(operation: &str, e: sqlx::Error) -> crate::error::ExpenseError {
    crate::error::ExpenseError::StoreError(format!("Failed to {}: {}", operation, e))
}

fn expense_from_row(row: &PgRow) -> Expense {
    let status_id: i64 = row.try_get("status_id").unwrap_or(1);

    Expense {
        expense_id: row.try_get("expense_id").unwrap_or(0),
        user_id: row.try_get("user_id").unwrap_or(0),
        user_name: row.try_get("user_name").unwrap_or_default(),
        email: row.try_get("email").unwrap_or_default(),
        category_id: row.try_get("category_id").unwrap_or(0),
        category_name: row.try_get("category_name").unwrap_or_default(),
        status: ExpenseStatus::from_id(status_id).unwrap_or(ExpenseStatus::Draft),
        amount_minor: row.try_get("amount_minor").unwrap_or(0),
        currency: row
            .try_get("currency")
            .unwrap_or_else(|_| "GBP".to_string()),
        expense_date: row
            .try_get("expense_date")
            .unwrap_or_else(|_| chrono::Utc::now().date_naive()),
        description: row.try_get("description").ok(),
        receipt_file: row.try_get("receipt_file").ok(),
        submitted_at: row.try_get("submitted_at").ok().flatten(),
        reviewed_by: row.try_get("reviewed_by").ok().flatten(),
        reviewer_name: row.try_get("reviewer_name").ok().flatten(),
        reviewed_at: row.try_get("reviewed_at").ok().flatten(),
        created_at: row
            .try_get("created_at")
            .unwrap_or_else(|_| chrono::Utc::now()),
    }
}

#[async_trait::async_trait]
impl ExpenseStore for PgExpenseStore {

    async fn list_all(&self) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;
        let sql = format!("{} ORDER BY e.expense_id", EXPENSE_SELECT);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list expenses", e))?;
        Ok(rows.iter().map(expense_from_row).collect())
    }

    async fn get_by_id(&self, expense_id: i64) -> Result<Option<Expense>> {
        self.ensure_schema().await?;
        let sql = format!("{} WHERE e.expense_id = $1", EXPENSE_SELECT);
        let row = sqlx::query(&sql)
            .bind(expense_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("get expense by id", e))?;
        Ok(row.as_ref().map(expense_from_row))
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;
        let sql = format!(
            "{} WHERE e.user_id = $1 ORDER BY e.expense_id",
            EXPENSE_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list expenses by user", e))?;
        Ok(rows.iter().map(expense_from_row).collect())
    }

    async fn list_pending(&self) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;
        let sql = format!(
            "{} WHERE e.status_id = 2 ORDER BY e.expense_id",
            EXPENSE_SELECT
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list pending expenses", e))?;
        Ok(rows.iter().map(expense_from_row).collect())
    }

    async fn search(&self, term: &str) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;
        let sql = format!(
            r#"{} WHERE e.description ILIKE '%' || $1 || '%'
                  OR c.category_name ILIKE '%' || $1 || '%'
                  OR u.user_name ILIKE '%' || $1 || '%'
               ORDER BY e.expense_id"#,
            EXPENSE_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(term)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("search expenses", e))?;
        Ok(rows.iter().map(expense_from_row).collect())
    }

    async fn create(&self, request: &CreateExpenseRequest) -> Result<i64> {
        self.ensure_schema().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO expenses
              (user_id, category_id, status_id, amount_minor, expense_date, description, receipt_file)
            VALUES ($1, $2, 1, $3, $4, $5, $6)
            RETURNING expense_id
            "#,
        )
        .bind(request.user_id)
        .bind(request.category_id)
        .bind(request.amount_minor())
        .bind(request.expense_date)
        .bind(&request.description)
        .bind(&request.receipt_file)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("create expense", e))?;

        Ok(row.try_get("expense_id").unwrap_or(0))
    }

    async fn update(&self, request: &UpdateExpenseRequest) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET category_id = $2, amount_minor = $3, expense_date = $4,
                description = $5, receipt_file = $6
            WHERE expense_id = $1 AND status_id = 1
            "#,
        )
        .bind(request.expense_id)
        .bind(request.category_id)
        .bind(request.amount_minor())
        .bind(request.expense_date)
        .bind(&request.description)
        .bind(&request.receipt_file)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("update expense", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn submit(&self, expense_id: i64) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET status_id = 2, submitted_at = NOW()
            WHERE expense_id = $1 AND status_id = 1
            "#,
        )
        .bind(expense_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("submit expense", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn approve(&self, expense_id: i64, reviewer_id: i64) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET status_id = 3, reviewed_by = $2, reviewed_at = NOW()
            WHERE expense_id = $1 AND status_id = 2
            "#,
        )
        .bind(expense_id)
        .bind(reviewer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("approve expense", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reject(&self, expense_id: i64, reviewer_id: i64) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET status_id = 4, reviewed_by = $2, reviewed_at = NOW()
            WHERE expense_id = $1 AND status_id = 2
            "#,
        )
        .bind(expense_id)
        .bind(reviewer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("reject expense", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, expense_id: i64) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(
            "DELETE FROM expenses WHERE expense_id = $1 AND status_id = 1",
        )
        .bind(expense_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("delete expense", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            "SELECT category_id, category_name, is_active FROM categories ORDER BY category_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list categories", e))?;

        Ok(rows
            .iter()
            .map(|row| Category {
                category_id: row.try_get("category_id").unwrap_or(0),
                category_name: row.try_get("category_name").unwrap_or_default(),
                is_active: row.try_get("is_active").unwrap_or(true),
            })
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            r#"
            SELECT u.user_id, u.user_name, u.email, u.role_id, u.role_name,
                   u.manager_id, m.user_name AS manager_name, u.is_active, u.created_at
            FROM users u
            LEFT JOIN users m ON m.user_id = u.manager_id
            ORDER BY u.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list users", e))?;

        Ok(rows
            .iter()
            .map(|row| User {
                user_id: row.try_get("user_id").unwrap_or(0),
                user_name: row.try_get("user_name").unwrap_or_default(),
                email: row.try_get("email").unwrap_or_default(),
                role_id: row.try_get("role_id").unwrap_or(0),
                role_name: row.try_get("role_name").unwrap_or_default(),
                manager_id: row.try_get("manager_id").ok().flatten(),
                manager_name: row.try_get("manager_name").ok().flatten(),
                is_active: row.try_get("is_active").unwrap_or(true),
                created_at: row
                    .try_get("created_at")
                    .unwrap_or_else(|_| chrono::Utc::now()),
            })
            .collect())
    }

    async fn list_statuses(&self) -> Result<Vec<ExpenseStatus>> {
        self.ensure_schema().await?;
        let rows = sqlx::query("SELECT status_id FROM expense_statuses ORDER BY status_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list statuses", e))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let id: i64 = row.try_get("status_id").ok()?;
                ExpenseStatus::from_id(id)
            })
            .collect())
    }
}
