//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved entity.
//! Every statement returns rows as `row_to_json`, so the store never decodes column types itself.

use crate::config::{ColumnKind, ResolvedEntity};
use crate::sql::params::to_bind;
use crate::store::{RefFilter, Row};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Bind a value as text and return its placeholder with an explicit cast.
    fn push_param(&mut self, kind: &ColumnKind, schema: &str, v: &Value) -> String {
        self.params.push(to_bind(kind, v));
        format!("${}::{}", self.params.len(), kind.pg_cast(schema))
    }
}

fn column_kind<'a>(entity: &'a ResolvedEntity, name: &str) -> &'a ColumnKind {
    static FALLBACK: ColumnKind = ColumnKind::Text { max_length: None };
    entity.column(name).map(|c| &c.kind).unwrap_or(&FALLBACK)
}

fn key_predicate(q: &mut QueryBuf, entity: &ResolvedEntity, key: &[Value]) -> String {
    entity
        .key_columns
        .iter()
        .zip(key)
        .map(|(col, v)| {
            let ph = q.push_param(column_kind(entity, col), &entity.schema_name, v);
            format!("{} = {}", quoted(col), ph)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn ref_predicate(q: &mut QueryBuf, entity: &ResolvedEntity, filter: &RefFilter<'_>) -> String {
    let ph = q.push_param(column_kind(entity, filter.column), &entity.schema_name, filter.value);
    let mut pred = format!("{} = {}", quoted(filter.column), ph);
    if let Some((type_col, discriminator)) = filter.discriminator {
        let ph = q.push_param(
            column_kind(entity, type_col),
            &entity.schema_name,
            &Value::String(discriminator.to_string()),
        );
        pred.push_str(&format!(" AND {} = {}", quoted(type_col), ph));
    }
    pred
}

fn order_by_key(entity: &ResolvedEntity) -> String {
    entity
        .key_columns
        .iter()
        .map(|c| quoted(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every row, ordered by key columns.
pub fn select_all(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT row_to_json(t) FROM {} t ORDER BY {}",
        qualified_table(entity),
        order_by_key(entity)
    );
    q
}

/// One row by full key. `lock` adds `FOR UPDATE`.
pub fn select_by_key(entity: &ResolvedEntity, key: &[Value], lock: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = key_predicate(&mut q, entity, key);
    q.sql = format!(
        "SELECT row_to_json(t) FROM {} t WHERE {}{}",
        qualified_table(entity),
        pred,
        if lock { " FOR UPDATE" } else { "" }
    );
    q
}

/// INSERT the supplied columns; everything else takes its column default.
pub fn insert(entity: &ResolvedEntity, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(entity);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(v) = row.get(&c.name) else { continue };
        placeholders.push(q.push_param(&c.kind, &entity.schema_name, v));
        cols.push(quoted(&c.name));
    }
    let insert = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q.sql = format!("WITH r AS ({} RETURNING *) SELECT row_to_json(r) FROM r", insert);
    q
}

/// UPDATE by key: SET supplied columns plus `touch_on_update` columns.
/// With nothing to set this degrades to a locked read.
pub fn update(entity: &ResolvedEntity, key: &[Value], changes: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.is_key {
            continue;
        }
        if let Some(v) = changes.get(&c.name) {
            let ph = q.push_param(&c.kind, &entity.schema_name, v);
            sets.push(format!("{} = {}", quoted(&c.name), ph));
        }
    }
    if sets.is_empty() {
        return select_by_key(entity, key, true);
    }
    for c in entity.columns.iter().filter(|c| c.touch_on_update) {
        sets.push(format!("{} = NOW()", quoted(&c.name)));
    }
    let pred = key_predicate(&mut q, entity, key);
    q.sql = format!(
        "WITH r AS (UPDATE {} SET {} WHERE {} RETURNING *) SELECT row_to_json(r) FROM r",
        qualified_table(entity),
        sets.join(", "),
        pred
    );
    q
}

/// DELETE by key, returning the deleted row.
pub fn delete(entity: &ResolvedEntity, key: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = key_predicate(&mut q, entity, key);
    q.sql = format!(
        "WITH r AS (DELETE FROM {} WHERE {} RETURNING *) SELECT row_to_json(r) FROM r",
        qualified_table(entity),
        pred
    );
    q
}

/// DELETE every row matching a reference filter, returning the deleted rows.
pub fn delete_where(entity: &ResolvedEntity, filter: &RefFilter<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = ref_predicate(&mut q, entity, filter);
    q.sql = format!(
        "WITH r AS (DELETE FROM {} WHERE {} RETURNING *) SELECT row_to_json(r) FROM r",
        qualified_table(entity),
        pred
    );
    q
}

/// Clear the filter column on every matching row.
pub fn set_null_where(entity: &ResolvedEntity, filter: &RefFilter<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = vec![format!("{} = NULL", quoted(filter.column))];
    for c in entity.columns.iter().filter(|c| c.touch_on_update) {
        sets.push(format!("{} = NOW()", quoted(&c.name)));
    }
    let pred = ref_predicate(&mut q, entity, filter);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        qualified_table(entity),
        sets.join(", "),
        pred
    );
    q
}

pub fn count_where(entity: &ResolvedEntity, filter: &RefFilter<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = ref_predicate(&mut q, entity, filter);
    q.sql = format!("SELECT COUNT(*) FROM {} WHERE {}", qualified_table(entity), pred);
    q
}
