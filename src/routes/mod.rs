//! Router assembly.

mod api;
mod common;

pub use api::api_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application: common and API routes, request body cap, HTTP tracing.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(api_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
