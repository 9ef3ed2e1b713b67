use anyhow::Result;
use axum::routing::any;
use axum::Router;
use relaygate_core::handler::proxy_handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let boot = relaygate_core::bootstrap::bootstrap_from_env().await?;

    let app = Router::new()
        .route("/{*path}", any(proxy_handler))
        .with_state(boot.state.clone())
        .nest("/admin", relaygate_admin::router(boot.state.clone()));

    let bind = format!("{}:{}", boot.host, boot.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(event = "listening", addr = %bind);
    axum::serve(listener, app).await?;
    Ok(())
}
