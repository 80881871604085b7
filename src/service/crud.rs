//! Generic resource engine: one implementation for every entity, keyed by 1..N columns.

use crate::config::{DeletePolicy, Operation, ResolvedEntity, ResolvedModel};
use crate::error::{AppError, ConfigError};
use crate::service::{RequestValidator, RowKey};
use crate::store::{RefFilter, Row, RowStore, StoreTx};
use serde_json::Value;

pub struct CrudService;

fn ensure_allowed(entity: &ResolvedEntity, op: Operation) -> Result<(), AppError> {
    if entity.allows(op) {
        Ok(())
    } else {
        Err(AppError::NotAllowed(format!(
            "{} is not enabled for {}",
            op.as_str(),
            entity.path_segment
        )))
    }
}

fn not_found(entity: &ResolvedEntity, key: &RowKey) -> AppError {
    AppError::NotFound(format!("{} {}", entity.path_segment, key))
}

fn entity_at<'m>(model: &'m ResolvedModel, path: &str) -> Result<&'m ResolvedEntity, AppError> {
    model.entity_by_path(path).ok_or_else(|| {
        AppError::Config(ConfigError::MissingReference {
            kind: "entity",
            id: path.to_string(),
        })
    })
}

impl CrudService {
    /// Every row, in store order.
    pub async fn list(store: &dyn RowStore, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError> {
        ensure_allowed(entity, Operation::List)?;
        store.list(entity).await
    }

    pub async fn read(store: &dyn RowStore, entity: &ResolvedEntity, key: &RowKey) -> Result<Row, AppError> {
        ensure_allowed(entity, Operation::Read)?;
        store
            .fetch(entity, key.values())
            .await?
            .ok_or_else(|| not_found(entity, key))
    }

    /// Validate, check polymorphic targets, insert. Duplicate keys surface as Conflict.
    pub async fn create(
        store: &dyn RowStore,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        body: &Value,
    ) -> Result<Row, AppError> {
        ensure_allowed(entity, Operation::Create)?;
        let row = RequestValidator::create_payload(entity, body)?;
        let mut tx = store.begin().await?;
        verify_targets(tx.as_mut(), model, entity, &row, None).await?;
        let created = tx.insert(entity, &row).await?;
        tx.commit().await?;
        tracing::debug!(entity = %entity.path_segment, "row created");
        Ok(created)
    }

    /// Partial merge under a row lock. Last committed writer wins.
    pub async fn update(
        store: &dyn RowStore,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        key: &RowKey,
        body: &Value,
    ) -> Result<Row, AppError> {
        ensure_allowed(entity, Operation::Update)?;
        let changes = RequestValidator::update_payload(entity, body)?;
        let mut tx = store.begin().await?;
        let existing = tx
            .fetch(entity, key.values(), true)
            .await?
            .ok_or_else(|| not_found(entity, key))?;
        let mut merged = existing.clone();
        merged.extend(changes.clone());
        verify_targets(tx.as_mut(), model, entity, &merged, Some(&changes)).await?;
        let updated = tx
            .update(entity, key.values(), &changes)
            .await?
            .ok_or_else(|| not_found(entity, key))?;
        tx.commit().await?;
        tracing::debug!(entity = %entity.path_segment, key = %key, "row updated");
        Ok(updated)
    }

    /// Delete one row and apply each dependent's delete policy in the same transaction.
    pub async fn delete(
        store: &dyn RowStore,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        key: &RowKey,
    ) -> Result<(), AppError> {
        ensure_allowed(entity, Operation::Delete)?;
        let mut tx = store.begin().await?;
        let deleted = tx
            .delete(entity, key.values())
            .await?
            .ok_or_else(|| not_found(entity, key))?;
        apply_delete_policies(tx.as_mut(), model, entity, deleted).await?;
        tx.commit().await?;
        tracing::debug!(entity = %entity.path_segment, key = %key, "row deleted");
        Ok(())
    }
}

/// Existence checks for polymorphic references with `verify` on.
/// With `changed` set, only references whose columns changed are checked.
async fn verify_targets(
    tx: &mut dyn StoreTx,
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    row: &Row,
    changed: Option<&Row>,
) -> Result<(), AppError> {
    for poly in entity.polymorphic.iter().filter(|p| p.verify) {
        if let Some(changed) = changed {
            if !changed.contains_key(&poly.id_column) && !changed.contains_key(&poly.type_column) {
                continue;
            }
        }
        let (Some(id), Some(discriminator)) = (
            row.get(&poly.id_column).filter(|v| !v.is_null()),
            row.get(&poly.type_column).and_then(Value::as_str),
        ) else {
            continue;
        };
        let Some(target) = poly.target(discriminator) else {
            continue;
        };
        let target_entity = entity_at(model, &target.path_segment)?;
        if tx.fetch(target_entity, std::slice::from_ref(id), false).await?.is_none() {
            return Err(AppError::Validation(format!(
                "{} {} refers to a missing {} row",
                poly.id_column, id, target.path_segment
            )));
        }
    }
    Ok(())
}

async fn apply_delete_policies(
    tx: &mut dyn StoreTx,
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    deleted: Row,
) -> Result<(), AppError> {
    let mut pending: Vec<(&ResolvedEntity, Row)> = vec![(entity, deleted)];
    while let Some((owner, row)) = pending.pop() {
        for dep in owner.dependents.iter().filter(|d| d.policy != DeletePolicy::Orphan) {
            let Some(value) = row.get(&dep.referenced_column).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = entity_at(model, &dep.path_segment)?;
            let filter = RefFilter {
                column: &dep.column,
                value,
                discriminator: dep.discriminator.as_ref().map(|(c, d)| (c.as_str(), d.as_str())),
            };
            match dep.policy {
                DeletePolicy::Orphan => {}
                DeletePolicy::Restrict => {
                    let n = tx.count_where(target, &filter).await?;
                    if n > 0 {
                        tracing::warn!(
                            entity = %owner.path_segment,
                            dependent = %dep.path_segment,
                            count = n,
                            "delete restricted"
                        );
                        return Err(AppError::Conflict(format!(
                            "{} row is still referenced by {} {} row(s)",
                            owner.path_segment, n, dep.path_segment
                        )));
                    }
                }
                DeletePolicy::SetNull => {
                    tx.set_null_where(target, &filter).await?;
                }
                DeletePolicy::Cascade => {
                    let removed = tx.delete_where(target, &filter).await?;
                    tracing::debug!(dependent = %dep.path_segment, count = removed.len(), "cascade delete");
                    pending.extend(removed.into_iter().map(|r| (target, r)));
                }
            }
        }
    }
    Ok(())
}
