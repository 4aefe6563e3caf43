//! Static fallback datasets
//!
//! Served when no persistence port is configured or the store is
//! unreachable. Reads degrade to these; writes never fabricate anything.

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{Category, Expense, ExpenseStatus, User};

pub fn demo_expenses() -> Vec<Expense> {
    let now = Utc::now();
    vec![
        Expense {
            expense_id: 1,
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            category_id: 1,
            category_name: "Travel".to_string(),
            status: ExpenseStatus::Submitted,
            amount_minor: 12000,
            currency: "GBP".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: Some("Taxi from airport to client site".to_string()),
            receipt_file: None,
            submitted_at: Some(now - Duration::days(2)),
            reviewed_by: None,
            reviewer_name: None,
            reviewed_at: None,
            created_at: now - Duration::days(3),
        },
        Expense {
            expense_id: 2,
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            category_id: 2,
            category_name: "Food".to_string(),
            status: ExpenseStatus::Submitted,
            amount_minor: 6900,
            currency: "GBP".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
            description: Some("Client lunch meeting".to_string()),
            receipt_file: None,
            submitted_at: Some(now - Duration::days(5)),
            reviewed_by: None,
            reviewer_name: None,
            reviewed_at: None,
            created_at: now - Duration::days(6),
        },
        Expense {
            expense_id: 3,
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            category_id: 3,
            category_name: "Office Supplies".to_string(),
            status: ExpenseStatus::Approved,
            amount_minor: 9950,
            currency: "GBP".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2023, 12, 4).unwrap(),
            description: Some("Office stationery".to_string()),
            receipt_file: None,
            submitted_at: Some(now - Duration::days(10)),
            reviewed_by: Some(2),
            reviewer_name: Some("Bob Manager".to_string()),
            reviewed_at: Some(now - Duration::days(9)),
            created_at: now - Duration::days(11),
        },
        Expense {
            expense_id: 4,
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            category_id: 1,
            category_name: "Transport".to_string(),
            status: ExpenseStatus::Submitted,
            amount_minor: 1920,
            currency: "GBP".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2023, 12, 18).unwrap(),
            description: Some("Train tickets to conference".to_string()),
            receipt_file: None,
            submitted_at: Some(now - Duration::days(1)),
            reviewed_by: None,
            reviewer_name: None,
            reviewed_at: None,
            created_at: now - Duration::days(2),
        },
    ]
}

pub fn demo_categories() -> Vec<Category> {
    vec![
        Category { category_id: 1, category_name: "Travel".to_string(), is_active: true },
        Category { category_id: 2, category_name: "Food".to_string(), is_active: true },
        Category { category_id: 3, category_name: "Office Supplies".to_string(), is_active: true },
        Category { category_id: 4, category_name: "Accommodation".to_string(), is_active: true },
        Category { category_id: 5, category_name: "Other".to_string(), is_active: true },
    ]
}

pub fn demo_users() -> Vec<User> {
    let now = Utc::now();
    vec![
        User {
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            role_id: 1,
            role_name: "Employee".to_string(),
            manager_id: Some(2),
            manager_name: Some("Bob Manager".to_string()),
            is_active: true,
            created_at: now,
        },
        User {
            user_id: 2,
            user_name: "Bob Manager".to_string(),
            email: "bob.manager@example.co.uk".to_string(),
            role_id: 2,
            role_name: "Manager".to_string(),
            manager_id: None,
            manager_name: None,
            is_active: true,
            created_at: now,
        },
    ]
}

pub fn demo_statuses() -> Vec<ExpenseStatus> {
    ExpenseStatus::ALL.to_vec()
}
