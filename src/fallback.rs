//! Deterministic fallback responder
//!
//! Used when no model backend is configured. An ordered set of substring
//! predicates over the lower-cased message; first match wins, so the
//! listing check runs before the pending check before the category check.

const LISTING_RESPONSE: &str = r#"**Expense List** (Demo Data)

Here are the current expenses:

1. **15/01/2024** - Travel - £120.00 - Submitted
   _Taxi from airport to client site_

2. **10/01/2023** - Food - £69.00 - Submitted
   _Client lunch meeting_

3. **04/12/2023** - Office Supplies - £99.50 - Approved
   _Office stationery_

4. **18/12/2023** - Transport - £19.20 - Submitted
   _Train tickets to conference_

---
**Note**: This is demo data. Configure the chat backend to enable AI-powered
responses with live database access."#;

const PENDING_RESPONSE: &str = r#"**Pending Expenses** (Demo Data)

The following expenses are awaiting approval:

1. **ID: 1** - Travel - £120.00
   _Submitted by Alice Example_

2. **ID: 2** - Food - £69.00
   _Submitted by Alice Example_

4. **ID: 4** - Transport - £19.20
   _Submitted by Alice Example_

---
**Note**: This is demo data. The chat backend is not configured."#;

const CATEGORIES_RESPONSE: &str = r#"**Expense Categories**

1. Travel
2. Food
3. Office Supplies
4. Accommodation
5. Other

---
**Note**: This is demo data."#;

const HELP_RESPONSE: &str = r#"Hello! I'm the Expense Management Assistant.

I can help you with:
- **List expenses**: "Show me all expenses"
- **Pending approvals**: "What expenses need approval?"
- **Categories**: "What expense categories are available?"
- **Search**: "Find travel expenses"

---
**Note**: The chat backend is not configured, so I'm providing demo
responses. Set OPENAI_ENDPOINT and OPENAI_API_KEY to enable full AI
capabilities."#;

/// Canned response selected by keyword inspection. Pure and synchronous;
/// performs no tool calls and touches no store.
pub fn respond(message: &str) -> String {
    let lowered = message.to_lowercase();

    if lowered.contains("expense")
        && (lowered.contains("list") || lowered.contains("show") || lowered.contains("all"))
    {
        return LISTING_RESPONSE.to_string();
    }

    if lowered.contains("pending") || lowered.contains("approve") {
        return PENDING_RESPONSE.to_string();
    }

    if lowered.contains("categor") {
        return CATEGORIES_RESPONSE.to_string();
    }

    HELP_RESPONSE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_keywords() {
        let cases = vec![
            "show me all expenses",
            "SHOW ME ALL EXPENSES",
            "list my expenses please",
        ];
        for c in cases {
            assert!(respond(c).starts_with("**Expense List**"), "case: {}", c);
        }
    }

    #[test]
    fn test_pending_keywords() {
        let cases = vec![
            "what's pending?",
            "anything to approve today?",
            "What expenses need approval?",
        ];
        for c in cases {
            assert!(respond(c).starts_with("**Pending Expenses**"), "case: {}", c);
        }
    }

    #[test]
    fn test_category_keywords() {
        assert!(respond("what categories are there").starts_with("**Expense Categories**"));
        assert!(respond("which category fits a hotel?").starts_with("**Expense Categories**"));
    }

    #[test]
    fn test_generic_help() {
        assert!(respond("hi").starts_with("Hello!"));
        assert!(respond("what can you do").starts_with("Hello!"));
    }

    #[test]
    fn test_first_match_wins_ordering() {
        // matches both the listing and the pending predicates; the listing
        // check is evaluated first
        let response = respond("show all pending expenses");
        assert!(response.starts_with("**Expense List**"));

        // pending beats categories
        let response = respond("approve the travel category expense claims? pending ones");
        assert!(response.starts_with("**Pending Expenses**"));
    }
}
