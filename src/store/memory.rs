//! In-process backend with the same row semantics as the PostgreSQL store.
//!
//! Transactions are serialised: `begin` takes the table lock and works on a copy
//! that `commit` writes back.

use crate::config::{ColumnDefault, ResolvedEntity};
use crate::error::AppError;
use crate::service::format_timestamp;
use crate::store::{key_of, RefFilter, Row, RowStore, StoreTx};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct TableData {
    rows: Vec<Row>,
    next_identity: i64,
}

type Tables = HashMap<String, TableData>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> Value {
    Value::String(format_timestamp(&Utc::now()))
}

fn has_key(entity: &ResolvedEntity, row: &Row, key: &[Value]) -> bool {
    key_of(entity, row).as_slice() == key
}

/// Primary key and unique sets. NULLs never conflict.
fn check_unique(entity: &ResolvedEntity, rows: &[Row], candidate: &Row, skip: Option<usize>) -> Result<(), AppError> {
    let key = key_of(entity, candidate);
    let others = || rows.iter().enumerate().filter(|(i, _)| Some(*i) != skip).map(|(_, r)| r);
    if others().any(|r| has_key(entity, r, &key)) {
        return Err(AppError::Conflict(format!(
            "duplicate key value violates unique constraint \"{}_pkey\"",
            entity.table_name
        )));
    }
    for set in &entity.unique {
        let values: Vec<&Value> = set.iter().map(|c| candidate.get(c).unwrap_or(&Value::Null)).collect();
        if values.iter().any(|v| v.is_null()) {
            continue;
        }
        let clash = others().any(|r| {
            set.iter()
                .zip(&values)
                .all(|(c, v)| r.get(c).is_some_and(|existing| existing == *v))
        });
        if clash {
            return Err(AppError::Conflict(format!(
                "duplicate key value violates unique constraint \"{}_{}_key\"",
                entity.table_name,
                set.join("_")
            )));
        }
    }
    Ok(())
}

fn check_not_null(entity: &ResolvedEntity, row: &Row) -> Result<(), AppError> {
    for c in entity.columns.iter().filter(|c| !c.nullable) {
        if row.get(&c.name).map_or(true, Value::is_null) {
            return Err(AppError::Validation(format!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                c.name, entity.table_name
            )));
        }
    }
    Ok(())
}

fn touch(entity: &ResolvedEntity, row: &mut Row) {
    for c in entity.columns.iter().filter(|c| c.touch_on_update) {
        row.insert(c.name.clone(), now());
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&entity.table_id)
            .map(|t| t.rows.clone())
            .unwrap_or_default())
    }

    async fn fetch(&self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&entity.table_id)
            .and_then(|t| t.rows.iter().find(|r| has_key(entity, r, key)))
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

impl MemoryTx {
    fn table(&mut self, entity: &ResolvedEntity) -> &mut TableData {
        self.work.entry(entity.table_id.clone()).or_default()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn fetch(
        &mut self,
        entity: &ResolvedEntity,
        key: &[Value],
        _lock: bool,
    ) -> Result<Option<Row>, AppError> {
        Ok(self
            .table(entity)
            .rows
            .iter()
            .find(|r| has_key(entity, r, key))
            .cloned())
    }

    async fn insert(&mut self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let table = self.table(entity);
        let mut full = Row::new();
        for c in &entity.columns {
            let value = if let Some(v) = row.get(&c.name) {
                v.clone()
            } else if c.identity {
                table.next_identity += 1;
                Value::from(table.next_identity)
            } else {
                match &c.default {
                    Some(ColumnDefault::Value(v)) => v.clone(),
                    Some(ColumnDefault::Now) => now(),
                    None => Value::Null,
                }
            };
            full.insert(c.name.clone(), value);
        }
        check_not_null(entity, &full)?;
        check_unique(entity, &table.rows, &full, None)?;
        table.rows.push(full.clone());
        Ok(full)
    }

    async fn update(
        &mut self,
        entity: &ResolvedEntity,
        key: &[Value],
        changes: &Row,
    ) -> Result<Option<Row>, AppError> {
        let table = self.table(entity);
        let Some(idx) = table.rows.iter().position(|r| has_key(entity, r, key)) else {
            return Ok(None);
        };
        let mut updated = table.rows[idx].clone();
        let mut changed = false;
        for c in entity.columns.iter().filter(|c| !c.is_key) {
            if let Some(v) = changes.get(&c.name) {
                updated.insert(c.name.clone(), v.clone());
                changed = true;
            }
        }
        if changed {
            touch(entity, &mut updated);
            check_not_null(entity, &updated)?;
            check_unique(entity, &table.rows, &updated, Some(idx))?;
            table.rows[idx] = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&mut self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError> {
        let table = self.table(entity);
        Ok(table
            .rows
            .iter()
            .position(|r| has_key(entity, r, key))
            .map(|idx| table.rows.remove(idx)))
    }

    async fn delete_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<Vec<Row>, AppError> {
        let table = self.table(entity);
        let (removed, kept): (Vec<Row>, Vec<Row>) =
            std::mem::take(&mut table.rows).into_iter().partition(|r| filter.matches(r));
        table.rows = kept;
        Ok(removed)
    }

    async fn set_null_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<u64, AppError> {
        let table = self.table(entity);
        let mut n = 0;
        for row in table.rows.iter_mut().filter(|r| filter.matches(r)) {
            row.insert(filter.column.to_string(), Value::Null);
            touch(entity, row);
            n += 1;
        }
        Ok(n)
    }

    async fn count_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<u64, AppError> {
        Ok(self.table(entity).rows.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
