//! Introspection routes under `/_meta`.

use crate::handlers::meta::{entity_meta, list_entities};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn meta_routes(state: AppState) -> Router {
    Router::new()
        .route("/_meta/entities", get(list_entities))
        .route("/_meta/entities/:path_segment", get(entity_meta))
        .with_state(state)
}
