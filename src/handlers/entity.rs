//! Entity CRUD handlers: list, create, read, update, delete.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::response::{success_created, success_many, success_one};
use crate::service::{CrudService, RowKey};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

fn entity_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown resource: {}", path_segment)))
}

/// `/{resource}/{k1}/{k2}...`: one segment per key column.
fn parse_key(entity: &ResolvedEntity, raw: &str) -> Result<RowKey, AppError> {
    let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
    RowKey::parse(entity, &segments)
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let rows = CrudService::list(state.store.as_ref(), entity).await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let row = CrudService::create(state.store.as_ref(), &state.model, entity, &body).await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let key = parse_key(entity, &key)?;
    let row = CrudService::read(state.store.as_ref(), entity, &key).await?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, key)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let key = parse_key(entity, &key)?;
    let row = CrudService::update(state.store.as_ref(), &state.model, entity, &key, &body).await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let key = parse_key(entity, &key)?;
    CrudService::delete(state.store.as_ref(), &state.model, entity, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
