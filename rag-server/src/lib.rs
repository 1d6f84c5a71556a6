//! Router assembly for the HTTP entry point, split out from `main.rs` so
//! integration tests can drive the full stack with `tower::ServiceExt::oneshot`.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::auth::router())
        .merge(routes::collections::router())
        .merge(routes::documents::router())
        .merge(routes::search::router())
        .merge(routes::summarize::router())
        .merge(routes::query::router())
        .merge(routes::system_messages::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
