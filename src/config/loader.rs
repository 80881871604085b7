//! Resolve a validated catalog into the runtime entity model.

use crate::config::resolved::{
    ColumnDefault, ColumnInfo, ColumnKind, Dependent, PolymorphicRef, PolymorphicTarget, ResolvedEntity,
    ResolvedModel,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Map a catalog column type to its runtime kind.
pub fn column_kind(column: &ColumnConfig, config: &FullConfig) -> Result<ColumnKind, ConfigError> {
    let unknown = |name: &str| {
        ConfigError::Validation(format!("column {}: unknown type '{}'", column.name, name))
    };
    match &column.type_ {
        ColumnTypeConfig::Enum { enum_name } => {
            let e = config
                .enums
                .iter()
                .find(|e| &e.name == enum_name)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "enum",
                    id: enum_name.clone(),
                })?;
            Ok(ColumnKind::Enum {
                name: e.name.clone(),
                values: e.values.clone(),
            })
        }
        ColumnTypeConfig::Simple(name) => simple_kind(name, None).ok_or_else(|| unknown(name)),
        ColumnTypeConfig::Parameterized { name, params } => {
            let first = params.as_ref().and_then(|p| p.first().copied());
            simple_kind(name, first).ok_or_else(|| unknown(name))
        }
    }
}

fn simple_kind(name: &str, length: Option<u32>) -> Option<ColumnKind> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "bigint" | "int8" => ColumnKind::BigInt,
        "integer" | "int" | "int4" => ColumnKind::Int,
        "text" => ColumnKind::Text { max_length: None },
        "varchar" | "character varying" => ColumnKind::Text { max_length: length },
        "boolean" | "bool" => ColumnKind::Bool,
        "timestamptz" | "timestamp with time zone" => ColumnKind::Timestamptz,
        "date" => ColumnKind::Date,
        "json" | "jsonb" => ColumnKind::Json,
        _ => return None,
    };
    Some(kind)
}

/// Validate, then build the resolved model.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let table_id_to_path: HashMap<&str, &str> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api.path_segment.as_str()))
        .collect();
    let path_of = |table_id: &str| -> Result<String, ConfigError> {
        table_id_to_path
            .get(table_id)
            .map(|s| s.to_string())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "api entity for table",
                id: table_id.to_string(),
            })
    };

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let key_columns: Vec<String> = table.primary_key.columns().into_iter().map(String::from).collect();

        let mut columns = Vec::with_capacity(table.columns.len());
        for c in &table.columns {
            columns.push(ColumnInfo {
                name: c.name.clone(),
                kind: column_kind(c, config)?,
                nullable: c.nullable,
                default: c.default.as_ref().map(|d| match d {
                    ColumnDefaultConfig::Value(v) => ColumnDefault::Value(v.clone()),
                    ColumnDefaultConfig::Expression(_) => ColumnDefault::Now,
                }),
                identity: c.identity,
                readonly: c.readonly,
                touch_on_update: c.touch_on_update,
                is_key: key_columns.contains(&c.name),
            });
        }

        let update_columns = match &api.update_columns {
            Some(cols) => cols.clone(),
            None => columns
                .iter()
                .filter(|c| !c.is_key && !c.server_assigned())
                .map(|c| c.name.clone())
                .collect(),
        };

        let mut polymorphic = Vec::new();
        for p in config.polymorphic.iter().filter(|p| p.table == table.id) {
            let mut targets = Vec::new();
            for (discriminator, target_table) in &p.targets {
                let target = tables_by_id
                    .get(target_table.as_str())
                    .ok_or_else(|| ConfigError::MissingReference {
                        kind: "table",
                        id: target_table.clone(),
                    })?;
                targets.push(PolymorphicTarget {
                    discriminator: discriminator.clone(),
                    path_segment: path_of(target_table)?,
                    key_column: target.primary_key.columns()[0].to_string(),
                });
            }
            polymorphic.push(PolymorphicRef {
                id_column: p.id_column.clone(),
                type_column: p.type_column.clone(),
                targets,
                verify: p.verify,
            });
        }

        let mut dependents = Vec::new();
        for rel in config.relationships.iter().filter(|r| r.to_table == table.id) {
            dependents.push(Dependent {
                path_segment: path_of(&rel.from_table)?,
                column: rel.from_column.clone(),
                referenced_column: rel.to_column.clone(),
                discriminator: None,
                policy: rel.on_delete,
            });
        }
        for p in &config.polymorphic {
            for (discriminator, _) in p.targets.iter().filter(|(_, t)| **t == table.id) {
                dependents.push(Dependent {
                    path_segment: path_of(&p.table)?,
                    column: p.id_column.clone(),
                    referenced_column: key_columns[0].clone(),
                    discriminator: Some((p.type_column.clone(), discriminator.clone())),
                    policy: p.on_delete,
                });
            }
        }

        let operations: HashSet<Operation> = api.operations.iter().copied().collect();
        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            schema_name: config.schema.clone(),
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            key_columns,
            columns,
            unique: table.unique.clone(),
            operations,
            update_columns,
            validation: api.validation.clone(),
            ascending_pairs: api
                .ascending_pairs
                .iter()
                .map(|[low, high]| (low.clone(), high.clone()))
                .collect(),
            polymorphic,
            dependents,
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        schema_name: config.schema.clone(),
        enums: config.enums.iter().map(|e| (e.name.clone(), e.values.clone())).collect(),
        entities,
        entity_by_path,
    })
}
