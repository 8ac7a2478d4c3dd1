use anyhow::Result;
use olist_ingest::{db::PgConnector, server};
use reqwest::Client;
use std::{env, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    info!("Starting Olist ingestion service");

    // ─── 2) shared state ─────────────────────────────────────────────
    let state = Arc::new(server::AppState::new(Client::new(), PgConnector));
    let routes = server::routes(state);

    // ─── 3) serve ────────────────────────────────────────────────────
    // Cloud Run / Cloud Functions inject PORT; 8080 otherwise.
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    info!("Server starting on port {}", port);
    info!("Health check: http://localhost:{}/health", port);
    info!("Ingest endpoint: http://localhost:{}/", port);

    warp::serve(routes).run(([0, 0, 0, 0], port)).await;

    Ok(())
}
