//! Entity introspection: key, create and update shapes, field types, polymorphic references.

use crate::config::{ColumnKind, Operation, PolymorphicRef, ResolvedEntity};
use crate::error::AppError;
use crate::response::{success_many, success_one};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct FieldMeta<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub kind: &'a ColumnKind,
    pub nullable: bool,
    pub key: bool,
    pub server_assigned: bool,
}

#[derive(Serialize)]
pub struct CreateShape<'a> {
    pub required: Vec<&'a str>,
    pub optional: Vec<&'a str>,
}

#[derive(Serialize)]
pub struct EntityMeta<'a> {
    pub path_segment: &'a str,
    pub table: &'a str,
    pub key_columns: &'a [String],
    pub operations: Vec<&'static str>,
    pub create: CreateShape<'a>,
    pub update: &'a [String],
    pub fields: Vec<FieldMeta<'a>>,
    pub polymorphic: &'a [PolymorphicRef],
}

pub fn describe(entity: &ResolvedEntity) -> EntityMeta<'_> {
    let client_columns = entity.columns.iter().filter(|c| !c.server_assigned());
    let (optional, required): (Vec<_>, Vec<_>) = client_columns.partition(|c| {
        c.optional_on_create()
            && entity
                .validation
                .get(&c.name)
                .and_then(|r| r.required)
                != Some(true)
    });
    EntityMeta {
        path_segment: &entity.path_segment,
        table: &entity.table_name,
        key_columns: &entity.key_columns,
        operations: Operation::ALL
            .iter()
            .filter(|op| entity.allows(**op))
            .map(Operation::as_str)
            .collect(),
        create: CreateShape {
            required: required.iter().map(|c| c.name.as_str()).collect(),
            optional: optional.iter().map(|c| c.name.as_str()).collect(),
        },
        update: &entity.update_columns,
        fields: entity
            .columns
            .iter()
            .map(|c| FieldMeta {
                name: &c.name,
                kind: &c.kind,
                nullable: c.nullable,
                key: c.is_key,
                server_assigned: c.server_assigned(),
            })
            .collect(),
        polymorphic: &entity.polymorphic,
    }
}

pub async fn list_entities(State(state): State<AppState>) -> impl IntoResponse {
    let metas: Vec<EntityMeta<'_>> = state.model.entities.iter().map(describe).collect();
    success_many(metas).into_response()
}

pub async fn entity_meta(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown resource: {}", path_segment)))?;
    Ok(success_one(describe(entity)).into_response())
}
