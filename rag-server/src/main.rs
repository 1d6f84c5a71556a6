//! HTTP entry point (component C10): wires the routed endpoints from spec §6
//! onto an `AppContext`, grounded on `oxidize-pdf-api`'s axum server shape
//! (the teacher repo has no HTTP surface of its own).

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rag_server::{build_router, AppState};
use rag_service::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = rag_service::AppConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let ctx = AppContext::new(config)?;
    let state: AppState = Arc::new(ctx);

    let app = build_router(state);

    tracing::info!(%bind_addr, "starting rag-server");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
