//! Bind parameters: every value travels as text and is cast by its placeholder.

use crate::config::ColumnKind;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// Text form of a JSON value for a column of `kind`. `None` binds SQL NULL.
pub fn to_bind(kind: &ColumnKind, v: &Value) -> Option<String> {
    match (kind, v) {
        (_, Value::Null) => None,
        (ColumnKind::Json, other) => Some(other.to_string()),
        (_, Value::String(s)) => Some(s.clone()),
        (_, Value::Bool(b)) => Some(b.to_string()),
        (_, Value::Number(n)) => Some(n.to_string()),
        (_, other) => Some(other.to_string()),
    }
}

/// Prepare `sql` with `params` bound in order.
pub fn bind_all<'q>(sql: &'q str, params: &'q [Option<String>]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(p.as_deref());
    }
    query
}
