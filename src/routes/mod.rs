//! Routers and the assembled application.

mod common;
mod entity;
mod meta;

pub use common::{common_routes, common_routes_with_ready};
pub use entity::entity_routes;
pub use meta::meta_routes;

use crate::error::AppError;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

async fn no_route() -> AppError {
    AppError::NotFound("no such route".into())
}

/// Every router plus request tracing and a request body limit.
pub fn app(state: AppState, body_limit_bytes: usize) -> Router {
    common_routes_with_ready(state.clone())
        .merge(meta_routes(state.clone()))
        .merge(entity_routes(state))
        .fallback(no_route)
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
