use expense_management::{
    api::start_server,
    assistant::ChatAssistant,
    service::ExpenseService,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Expense Management Service - API Server");
    info!("Port: {}", api_port);

    // DATABASE_URL selects postgres, STORE=memory an in-memory store,
    // neither means demo mode (static fallback data, writes disabled)
    let expenses = Arc::new(ExpenseService::from_env());

    // Chat backend from OPENAI_* env; unconfigured means deterministic
    // fallback responses
    let assistant = Arc::new(ChatAssistant::from_env(Arc::clone(&expenses)));
    info!("AI chat enabled: {}", assistant.is_configured());

    start_server(expenses, assistant, api_port).await?;

    Ok(())
}
