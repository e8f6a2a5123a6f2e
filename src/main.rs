use userstore::db::AppState;
use userstore::users::{services::seed_default_users, UserRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "userstore=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;
    state.migrate().await?;

    let seeds = state.config.default_users.clone();
    if seeds.is_empty() {
        tracing::info!("no default users configured");
    } else {
        seed_default_users(&state.users, seeds).await?;
    }

    let users = state.users.get_users().await?;
    tracing::info!(count = users.len(), "user store ready");

    Ok(())
}
