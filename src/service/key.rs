//! Row keys: ordered, typed values of an entity's key columns.

use crate::config::{ColumnKind, ResolvedEntity};
use crate::error::AppError;
use crate::service::validation::normalise;
use serde_json::Value;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct RowKey(pub Vec<Value>);

impl RowKey {
    /// Parse one path segment per key column, in declared order.
    pub fn parse(entity: &ResolvedEntity, segments: &[&str]) -> Result<Self, AppError> {
        if segments.len() != entity.key_columns.len() {
            return Err(AppError::NotFound(format!(
                "{} is addressed by {} key segment(s): {}",
                entity.path_segment,
                entity.key_columns.len(),
                entity.key_columns.join("/")
            )));
        }
        let mut values = Vec::with_capacity(segments.len());
        for (col, seg) in entity.key_info().zip(segments) {
            let invalid = || AppError::Validation(format!("{}: '{}' is not a valid key value", col.name, seg));
            let v = match &col.kind {
                ColumnKind::BigInt | ColumnKind::Int => {
                    let n: i64 = seg.parse().map_err(|_| invalid())?;
                    normalise(col, &Value::from(n)).map_err(|_| invalid())?
                }
                ColumnKind::Bool => {
                    let b: bool = seg.parse().map_err(|_| invalid())?;
                    Value::Bool(b)
                }
                _ => normalise(col, &Value::String((*seg).to_string())).map_err(|_| invalid())?,
            };
            values.push(v);
        }
        Ok(RowKey(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match v {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}
