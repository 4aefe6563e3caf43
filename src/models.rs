//! Core data models for the expense management service

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Status =================
//

/// Closed set of expense lifecycle states. Materialized as reference data
/// (id + name) but never open-ended: no fifth state exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub const ALL: [ExpenseStatus; 4] = [
        ExpenseStatus::Draft,
        ExpenseStatus::Submitted,
        ExpenseStatus::Approved,
        ExpenseStatus::Rejected,
    ];

    pub fn status_id(&self) -> i64 {
        match self {
            ExpenseStatus::Draft => 1,
            ExpenseStatus::Submitted => 2,
            ExpenseStatus::Approved => 3,
            ExpenseStatus::Rejected => 4,
        }
    }

    pub fn from_id(id: i64) -> Option<ExpenseStatus> {
        match id {
            1 => Some(ExpenseStatus::Draft),
            2 => Some(ExpenseStatus::Submitted),
            3 => Some(ExpenseStatus::Approved),
            4 => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<ExpenseStatus> {
        match name {
            "Draft" => Some(ExpenseStatus::Draft),
            "Submitted" => Some(ExpenseStatus::Submitted),
            "Approved" => Some(ExpenseStatus::Approved),
            "Rejected" => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }

    /// Only drafts may be edited or deleted.
    pub fn is_editable(&self) -> bool {
        matches!(self, ExpenseStatus::Draft)
    }

    /// submit is legal only from Draft.
    pub fn can_submit(&self) -> bool {
        matches!(self, ExpenseStatus::Draft)
    }

    /// approve/reject are legal only from Submitted.
    pub fn can_review(&self) -> bool {
        matches!(self, ExpenseStatus::Submitted)
    }

    /// No transition exists out of Approved or Rejected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpenseStatus::Draft => "Draft",
            ExpenseStatus::Submitted => "Submitted",
            ExpenseStatus::Approved => "Approved",
            ExpenseStatus::Rejected => "Rejected",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Expense =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub expense_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub category_id: i64,
    pub category_name: String,
    pub status: ExpenseStatus,
    /// Amount in minor units (pence). Integer to avoid floating-point drift.
    pub amount_minor: i64,
    pub currency: String,
    pub expense_date: NaiveDate,
    pub description: Option<String>,
    pub receipt_file: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub reviewer_name: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Derived major-unit view of the amount.
    pub fn amount_major(&self) -> f64 {
        self.amount_minor as f64 / 100.0
    }

    /// Display amount, e.g. "£120.00"
    pub fn formatted_amount(&self) -> String {
        format!("£{:.2}", self.amount_major())
    }

    /// Display date, e.g. "15/01/2024"
    pub fn formatted_date(&self) -> String {
        self.expense_date.format("%d/%m/%Y").to_string()
    }
}

//
// ================= Reference Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub category_id: i64,
    pub category_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: String,
    pub manager_id: Option<i64>,
    pub manager_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

//
// ================= Requests =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseRequest {
    pub user_id: i64,
    pub category_id: i64,
    /// Major-unit amount as entered, e.g. 120.00
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub description: Option<String>,
    pub receipt_file: Option<String>,
}

impl CreateExpenseRequest {
    pub fn amount_minor(&self) -> i64 {
        (self.amount * 100.0) as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpenseRequest {
    pub expense_id: i64,
    pub category_id: i64,
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub description: Option<String>,
    pub receipt_file: Option<String>,
}

impl UpdateExpenseRequest {
    pub fn amount_minor(&self) -> i64 {
        (self.amount * 100.0) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_round_trip() {
        for status in ExpenseStatus::ALL {
            assert_eq!(ExpenseStatus::from_id(status.status_id()), Some(status));
            assert_eq!(ExpenseStatus::from_name(&status.to_string()), Some(status));
        }
        assert_eq!(ExpenseStatus::from_id(0), None);
        assert_eq!(ExpenseStatus::from_id(5), None);
        assert_eq!(ExpenseStatus::from_name("Pending"), None);
    }

    #[test]
    fn test_transition_predicates() {
        assert!(ExpenseStatus::Draft.is_editable());
        assert!(ExpenseStatus::Draft.can_submit());
        assert!(!ExpenseStatus::Draft.can_review());
        assert!(!ExpenseStatus::Draft.is_terminal());

        assert!(!ExpenseStatus::Submitted.is_editable());
        assert!(!ExpenseStatus::Submitted.can_submit());
        assert!(ExpenseStatus::Submitted.can_review());

        for status in [ExpenseStatus::Approved, ExpenseStatus::Rejected] {
            assert!(status.is_terminal());
            assert!(!status.is_editable());
            assert!(!status.can_submit());
            assert!(!status.can_review());
        }
    }

    #[test]
    fn test_amount_round_trip() {
        let request = CreateExpenseRequest {
            user_id: 1,
            category_id: 1,
            amount: 120.00,
            expense_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: None,
            receipt_file: None,
        };
        assert_eq!(request.amount_minor(), 12000);

        let expense = Expense {
            expense_id: 1,
            user_id: 1,
            user_name: "Alice Example".to_string(),
            email: "alice@example.co.uk".to_string(),
            category_id: 1,
            category_name: "Travel".to_string(),
            status: ExpenseStatus::Draft,
            amount_minor: request.amount_minor(),
            currency: "GBP".to_string(),
            expense_date: request.expense_date,
            description: None,
            receipt_file: None,
            submitted_at: None,
            reviewed_by: None,
            reviewer_name: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(expense.amount_major(), 120.00);
        assert_eq!(expense.formatted_amount(), "£120.00");
        assert_eq!(expense.formatted_date(), "15/01/2024");
    }
}
