//! Expense Management Service
//!
//! A small expense-tracking service core:
//! - Employees create draft expenses and submit them for review
//! - Managers approve or reject submitted expenses
//! - An optional AI assistant answers questions about expense data
//!   through a bounded function-calling loop
//!
//! Lifecycle: Draft → Submitted → Approved | Rejected

pub mod api;
pub mod assistant;
pub mod backend;
pub mod demo;
pub mod error;
pub mod fallback;
pub mod models;
pub mod openai;
pub mod service;
pub mod store;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use service::{ExpenseService, ReadOutcome};
