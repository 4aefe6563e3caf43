//! REST API for the expense management service
//!
//! Exposes the lifecycle manager and the chat assistant via HTTP.
//! Auth is out of scope: callers are trusted, and the reviewer identity
//! defaulting below stands in for the missing auth collaborator — the core
//! components themselves only ever see explicit identities.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::assistant::ChatAssistant;
use crate::models::{Category, CreateExpenseRequest, Expense, UpdateExpenseRequest, User};
use crate::service::ExpenseService;

/// Stand-in reviewer for requests that name none (demo manager).
const DEFAULT_REVIEWER_ID: i64 = 2;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewerParams {
    pub reviewer_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub reviewer_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub is_ai_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatStatusResponse {
    pub is_ai_enabled: bool,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub expenses: Arc<ExpenseService>,
    pub assistant: Arc<ChatAssistant>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Expense Endpoints
/// =============================

async fn list_expenses(State(state): State<ApiState>) -> Json<Vec<Expense>> {
    Json(state.expenses.list_all().await.data)
}

async fn get_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, StatusCode> {
    match state.expenses.get_by_id(id).await.data {
        Some(expense) => Ok(Json(expense)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn list_expenses_by_user(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Json<Vec<Expense>> {
    Json(state.expenses.list_by_user(user_id).await.data)
}

async fn list_pending_expenses(State(state): State<ApiState>) -> Json<Vec<Expense>> {
    Json(state.expenses.list_pending().await.data)
}

async fn search_expenses(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Expense>> {
    // a blank term means "return all"
    let term = params.term.unwrap_or_default();
    if term.trim().is_empty() {
        return Json(state.expenses.list_all().await.data);
    }
    Json(state.expenses.search(&term).await.data)
}

async fn create_expense(
    State(state): State<ApiState>,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<i64>), (StatusCode, String)> {
    let expense_id = state.expenses.create(&request).await;
    if expense_id == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Failed to create expense".to_string(),
        ));
    }
    Ok((StatusCode::CREATED, Json(expense_id)))
}

async fn update_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateExpenseRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if id != request.expense_id {
        return Err((StatusCode::BAD_REQUEST, "ID mismatch".to_string()));
    }

    if state.expenses.update(&request).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Failed to update expense".to_string()))
    }
}

async fn submit_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.expenses.submit(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "Failed to submit expense".to_string(),
        ))
    }
}

async fn approve_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(params): Query<ReviewerParams>,
) -> Result<StatusCode, (StatusCode, String)> {
    let reviewer_id = params.reviewer_id.unwrap_or(DEFAULT_REVIEWER_ID);
    if state.expenses.approve(id, reviewer_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "Failed to approve expense".to_string(),
        ))
    }
}

async fn reject_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(params): Query<ReviewerParams>,
) -> Result<StatusCode, (StatusCode, String)> {
    let reviewer_id = params.reviewer_id.unwrap_or(DEFAULT_REVIEWER_ID);
    if state.expenses.reject(id, reviewer_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "Failed to reject expense".to_string(),
        ))
    }
}

async fn delete_expense(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.expenses.delete(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "Failed to delete expense. Only draft expenses can be deleted.".to_string(),
        ))
    }
}

/// =============================
/// Reference Data Endpoints
/// =============================

async fn list_categories(State(state): State<ApiState>) -> Json<Vec<Category>> {
    Json(state.expenses.list_categories().await.data)
}

async fn list_users(State(state): State<ApiState>) -> Json<Vec<User>> {
    Json(state.expenses.list_users().await.data)
}

async fn list_statuses(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let statuses = state.expenses.list_statuses().await.data;
    Json(serde_json::Value::Array(
        statuses
            .iter()
            .map(|s| {
                serde_json::json!({
                    "status_id": s.status_id(),
                    "status_name": s.to_string(),
                })
            })
            .collect(),
    ))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if request.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required".to_string()));
    }

    let reviewer_id = request.reviewer_id.unwrap_or(DEFAULT_REVIEWER_ID);
    let message = state.assistant.respond(&request.message, reviewer_id).await;

    Ok(Json(ChatResponse {
        message,
        is_ai_enabled: state.assistant.is_configured(),
    }))
}

async fn chat_status(State(state): State<ApiState>) -> Json<ChatStatusResponse> {
    Json(ChatStatusResponse {
        is_ai_enabled: state.assistant.is_configured(),
    })
}

/// =============================
/// Router
/// =============================

pub fn create_router(expenses: Arc<ExpenseService>, assistant: Arc<ChatAssistant>) -> Router {
    let state = ApiState {
        expenses,
        assistant,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/expenses", get(list_expenses).post(create_expense))
        .route("/api/expenses/pending", get(list_pending_expenses))
        .route("/api/expenses/search", get(search_expenses))
        .route("/api/expenses/user/:user_id", get(list_expenses_by_user))
        .route(
            "/api/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/api/expenses/:id/submit", post(submit_expense))
        .route("/api/expenses/:id/approve", post(approve_expense))
        .route("/api/expenses/:id/reject", post(reject_expense))
        .route("/api/categories", get(list_categories))
        .route("/api/users", get(list_users))
        .route("/api/statuses", get(list_statuses))
        .route("/api/chat", post(chat))
        .route("/api/chat/status", get(chat_status))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    expenses: Arc<ExpenseService>,
    assistant: Arc<ChatAssistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(expenses, assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
