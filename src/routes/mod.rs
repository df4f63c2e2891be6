//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! All browser API traffic enters under the configured prefix (default
//! `/api`) and is handed to the proxy; `/healthz` answers locally.

pub mod proxy;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Gateway router: proxy mount + health check.
pub fn app(state: AppState) -> Router {
    let prefix = state.config.prefix.clone();

    Router::new()
        .route(&prefix, any(proxy::proxy))
        .route(&format!("{prefix}/{{*rest}}"), any(proxy::proxy))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
