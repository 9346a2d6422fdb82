use mock_server::{app_with_state, AppState, DEFAULT_SECRET};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "mock_server=debug,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let secret = std::env::var("MOCK_JWT_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.to_string());
    let addr = format!("127.0.0.1:{port}");

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock server listening");
    axum::serve(listener, app_with_state(AppState::new(&secret))).await?;
    Ok(())
}
