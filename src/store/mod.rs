//! Storage boundary: a transactional row store over resolved entities.
//!
//! Rows are JSON objects keyed by column name. Keys are passed as the ordered
//! values of an entity's key columns. A [`StoreTx`] dropped without
//! [`StoreTx::commit`] rolls back.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{connect_pool, ensure_database_exists, PgStore};

use crate::config::ResolvedEntity;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

pub type Row = serde_json::Map<String, Value>;

/// Rows whose `column` equals `value`, optionally narrowed by a discriminator column.
#[derive(Clone, Copy, Debug)]
pub struct RefFilter<'a> {
    pub column: &'a str,
    pub value: &'a Value,
    pub discriminator: Option<(&'a str, &'a str)>,
}

impl RefFilter<'_> {
    pub fn matches(&self, row: &Row) -> bool {
        let hit = row.get(self.column).is_some_and(|v| !v.is_null() && v == self.value);
        hit && self
            .discriminator
            .map_or(true, |(col, disc)| row.get(col).and_then(Value::as_str) == Some(disc))
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Backend name for logs and readiness output.
    fn backend(&self) -> &'static str;

    async fn list(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError>;

    async fn fetch(&self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError>;

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Read one row by key; `lock` holds it until the transaction ends.
    async fn fetch(&mut self, entity: &ResolvedEntity, key: &[Value], lock: bool)
        -> Result<Option<Row>, AppError>;

    /// Insert supplied columns; identity, defaults and NULLs fill the rest.
    async fn insert(&mut self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError>;

    /// Apply `changes` to the row at `key`. `None` when no row matches.
    async fn update(&mut self, entity: &ResolvedEntity, key: &[Value], changes: &Row)
        -> Result<Option<Row>, AppError>;

    /// Delete the row at `key`, returning it.
    async fn delete(&mut self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError>;

    async fn delete_where(&mut self, entity: &ResolvedEntity, filter: &RefFilter<'_>)
        -> Result<Vec<Row>, AppError>;

    async fn set_null_where(&mut self, entity: &ResolvedEntity, filter: &RefFilter<'_>)
        -> Result<u64, AppError>;

    async fn count_where(&mut self, entity: &ResolvedEntity, filter: &RefFilter<'_>)
        -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Ordered key values of `row`.
pub fn key_of(entity: &ResolvedEntity, row: &Row) -> Vec<Value> {
    entity
        .key_columns
        .iter()
        .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
        .collect()
}
