//! Apply the resolved model to the database: schema, enum types, tables.
//! No foreign keys are emitted; delete policies are enforced by the engine.

use crate::config::{ColumnDefault, ColumnInfo, ColumnKind, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use serde_json::Value;
use sqlx::PgPool;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn default_sql(col: &ColumnInfo, schema: &str, default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Now => "NOW()".into(),
        ColumnDefault::Value(Value::Bool(b)) => (if *b { "TRUE" } else { "FALSE" }).into(),
        ColumnDefault::Value(Value::Number(n)) => n.to_string(),
        ColumnDefault::Value(Value::Null) => "NULL".into(),
        ColumnDefault::Value(Value::String(s)) if !matches!(col.kind, ColumnKind::Json) => {
            format!("{}::{}", literal(s), col.kind.pg_cast(schema))
        }
        ColumnDefault::Value(other) => format!("{}::json", literal(&other.to_string())),
    }
}

fn column_def(col: &ColumnInfo, schema: &str) -> String {
    let mut def = format!("{} {}", quote(&col.name), col.kind.pg_ddl(schema));
    if col.identity {
        def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }
    if !col.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(d) = &col.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default_sql(col, schema, d));
    }
    def
}

fn table_ddl(entity: &ResolvedEntity) -> String {
    let schema = &entity.schema_name;
    let mut defs: Vec<String> = entity.columns.iter().map(|c| column_def(c, schema)).collect();
    let keys: Vec<String> = entity.key_columns.iter().map(|k| quote(k)).collect();
    defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    for set in &entity.unique {
        let cols: Vec<String> = set.iter().map(|c| quote(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n  {}\n)",
        quote(schema),
        quote(&entity.table_name),
        defs.join(",\n  ")
    )
}

/// DDL statements in dependency order. Every statement is idempotent.
pub fn schema_ddl(model: &ResolvedModel) -> Vec<String> {
    let schema = quote(&model.schema_name);
    let mut out = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", schema)];
    for (name, values) in &model.enums {
        let values: Vec<String> = values.iter().map(|v| literal(v)).collect();
        out.push(format!(
            "DO $$ BEGIN CREATE TYPE {}.{} AS ENUM ({}); EXCEPTION WHEN duplicate_object THEN NULL; END $$",
            schema,
            quote(name),
            values.join(", ")
        ));
    }
    out.extend(model.entities.iter().map(table_ddl));
    out
}

pub async fn apply_schema(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let statements = schema_ddl(model);
    for sql in &statements {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(sql).execute(pool).await?;
    }
    tracing::info!(
        schema = %model.schema_name,
        enums = model.enums.len(),
        tables = model.entities.len(),
        "schema applied"
    );
    Ok(())
}
