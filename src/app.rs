use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{download_prices, healthcheck, upload_prices},
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    build_router_with_limit(state, None)
}

/// `max_upload_bytes` bounds request bodies; `None` disables the limit and
/// leaves the bound to whatever sits in front of the service.
pub fn build_router_with_limit(state: AppState, max_upload_bytes: Option<usize>) -> Router {
    let body_limit = match max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/health", get(healthcheck))
        .route("/api/v0/prices", post(upload_prices).get(download_prices))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
