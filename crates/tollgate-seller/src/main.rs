//! # tollgate-seller — Binary Entry Point
//!
//! Starts the seller HTTP service. Configuration comes from the
//! environment: `PORT` (default 8080) and `TOLLGATE_HOME` (default
//! `~/.tollgate`), the wallet home the identity registry reads DID
//! documents from.

use tollgate_seller::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let home = std::env::var("TOLLGATE_HOME").unwrap_or_else(|_| {
        let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{base}/.tollgate")
    });

    let config = AppConfig {
        port,
        ..AppConfig::default()
    };
    tracing::info!(home = %home, "loading identity registry");
    let state = AppState::with_home(home, config);

    let app = tollgate_seller::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("tollgate seller listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
