//! Catalog validation: referential integrity and API consistency.

use crate::config::{column_kind, ColumnDefaultConfig, DeletePolicy, FullConfig, TableConfig};
use crate::config::ColumnKind;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

fn missing(kind: &'static str, id: impl Into<String>) -> ConfigError {
    ConfigError::MissingReference { kind, id: id.into() }
}

fn table_column<'a>(
    tables: &HashMap<&str, &'a TableConfig>,
    table: &str,
    column: &str,
) -> Result<&'a crate::config::ColumnConfig, ConfigError> {
    let t = tables.get(table).ok_or_else(|| missing("table", table))?;
    t.columns
        .iter()
        .find(|c| c.name == column)
        .ok_or_else(|| missing("column", format!("{}.{}", table, column)))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.schema.trim().is_empty() {
        return Err(ConfigError::Validation("schema name must not be empty".into()));
    }

    let mut enum_names = HashSet::new();
    for e in &config.enums {
        if !enum_names.insert(e.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate enum: {}", e.name)));
        }
        if e.values.is_empty() {
            return Err(ConfigError::Validation(format!("enum {} has no values", e.name)));
        }
    }

    let mut tables: HashMap<&str, &TableConfig> = HashMap::new();
    for t in &config.tables {
        if tables.insert(t.id.as_str(), t).is_some() {
            return Err(ConfigError::Validation(format!("duplicate table id: {}", t.id)));
        }
        validate_table(config, t)?;
    }

    for r in &config.relationships {
        let from = table_column(&tables, &r.from_table, &r.from_column)?;
        table_column(&tables, &r.to_table, &r.to_column)?;
        if r.on_delete == DeletePolicy::SetNull && !from.nullable {
            return Err(ConfigError::Validation(format!(
                "relationship {}: set_null requires nullable column {}.{}",
                r.id, r.from_table, r.from_column
            )));
        }
    }

    for p in &config.polymorphic {
        let id_col = table_column(&tables, &p.table, &p.id_column)?;
        let type_col = table_column(&tables, &p.table, &p.type_column)?;
        if !column_kind(id_col, config)?.is_integer() {
            return Err(ConfigError::Validation(format!(
                "polymorphic {}: id column {} must be an integer",
                p.id, p.id_column
            )));
        }
        let ColumnKind::Enum { values, .. } = column_kind(type_col, config)? else {
            return Err(ConfigError::Validation(format!(
                "polymorphic {}: discriminator column {} must be an enum",
                p.id, p.type_column
            )));
        };
        for (discriminator, target) in &p.targets {
            if !values.contains(discriminator) {
                return Err(ConfigError::Validation(format!(
                    "polymorphic {}: '{}' is not a value of {}",
                    p.id, discriminator, p.type_column
                )));
            }
            let target_table = tables.get(target.as_str()).ok_or_else(|| missing("table", target))?;
            if target_table.primary_key.columns().len() != 1 {
                return Err(ConfigError::Validation(format!(
                    "polymorphic {}: target {} must have a single-column key",
                    p.id, target
                )));
            }
        }
        if p.on_delete == DeletePolicy::SetNull && !id_col.nullable {
            return Err(ConfigError::Validation(format!(
                "polymorphic {}: set_null requires nullable column {}.{}",
                p.id, p.table, p.id_column
            )));
        }
    }

    let mut path_segments = HashSet::new();
    let mut exposed = HashSet::new();
    for api in &config.api_entities {
        let table = tables
            .get(api.entity_id.as_str())
            .ok_or_else(|| missing("table", &api.entity_id))?;
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        if api.path_segment.is_empty() || api.path_segment.contains('/') || api.path_segment.starts_with('_') {
            return Err(ConfigError::Validation(format!(
                "invalid path segment: '{}'",
                api.path_segment
            )));
        }
        exposed.insert(api.entity_id.as_str());

        let keys = table.primary_key.columns();
        for col in api.update_columns.iter().flatten() {
            let c = table_column(&tables, &table.id, col)?;
            if keys.contains(&col.as_str()) || c.identity || c.readonly {
                return Err(ConfigError::Validation(format!(
                    "{}: update column {} is a key or server-assigned column",
                    api.path_segment, col
                )));
            }
        }
        for col in api.validation.keys() {
            table_column(&tables, &table.id, col)?;
        }
        for [low, high] in &api.ascending_pairs {
            table_column(&tables, &table.id, low)?;
            table_column(&tables, &table.id, high)?;
        }
    }

    for r in &config.relationships {
        for t in [&r.from_table, &r.to_table] {
            if !exposed.contains(t.as_str()) {
                return Err(missing("api entity for table", t));
            }
        }
    }
    for p in &config.polymorphic {
        for t in std::iter::once(&p.table).chain(p.targets.values()) {
            if !exposed.contains(t.as_str()) {
                return Err(missing("api entity for table", t));
            }
        }
    }

    Ok(())
}

fn validate_table(config: &FullConfig, t: &TableConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for c in &t.columns {
        if !names.insert(c.name.as_str()) {
            return Err(ConfigError::Validation(format!("{}: duplicate column {}", t.id, c.name)));
        }
        let kind = column_kind(c, config)?;
        if c.identity && !kind.is_integer() {
            return Err(ConfigError::Validation(format!(
                "{}.{}: identity columns must be integers",
                t.id, c.name
            )));
        }
        if c.touch_on_update && kind != ColumnKind::Timestamptz {
            return Err(ConfigError::Validation(format!(
                "{}.{}: touch_on_update requires timestamptz",
                t.id, c.name
            )));
        }
        if let Some(ColumnDefaultConfig::Expression(expr)) = &c.default {
            if !expr.eq_ignore_ascii_case("now") {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: unknown default expression '{}'",
                    t.id, c.name, expr
                )));
            }
        }
    }

    let keys = t.primary_key.columns();
    if keys.is_empty() {
        return Err(ConfigError::Validation(format!("{}: empty primary key", t.id)));
    }
    for pk in &keys {
        if !names.contains(pk) {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: (*pk).to_string(),
            });
        }
    }
    for c in t.columns.iter().filter(|c| c.identity) {
        if keys.len() != 1 || keys[0] != c.name {
            return Err(ConfigError::Validation(format!(
                "{}.{}: identity is only supported on a single-column key",
                t.id, c.name
            )));
        }
    }
    for set in &t.unique {
        for col in set {
            if !names.contains(col.as_str()) {
                return Err(missing("column", format!("{}.{}", t.id, col)));
            }
        }
    }
    Ok(())
}
