//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{DeletePolicy, Operation, ValidationRule};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Runtime column type. Drives payload type checks, SQL casts and DDL.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    #[serde(rename = "bigint")]
    BigInt,
    #[serde(rename = "integer")]
    Int,
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
    #[serde(rename = "boolean")]
    Bool,
    Timestamptz,
    Date,
    Json,
    Enum {
        name: String,
        values: Vec<String>,
    },
}

impl ColumnKind {
    /// PostgreSQL type used in placeholder casts (`$1::bigint`). Enums are schema-qualified.
    pub fn pg_cast(&self, schema: &str) -> String {
        match self {
            ColumnKind::BigInt => "bigint".into(),
            ColumnKind::Int => "integer".into(),
            ColumnKind::Text { .. } => "text".into(),
            ColumnKind::Bool => "boolean".into(),
            ColumnKind::Timestamptz => "timestamptz".into(),
            ColumnKind::Date => "date".into(),
            ColumnKind::Json => "json".into(),
            ColumnKind::Enum { name, .. } => format!("\"{}\".\"{}\"", schema, name),
        }
    }

    /// PostgreSQL type used in column definitions.
    pub fn pg_ddl(&self, schema: &str) -> String {
        match self {
            ColumnKind::Text { max_length: Some(n) } => format!("varchar({})", n),
            other => other.pg_cast(schema),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::BigInt | ColumnKind::Int)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnDefault {
    Value(serde_json::Value),
    Now,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub identity: bool,
    pub readonly: bool,
    pub touch_on_update: bool,
    pub is_key: bool,
}

impl ColumnInfo {
    /// Assigned by the server on create; clients never supply it.
    pub fn server_assigned(&self) -> bool {
        self.identity || self.readonly
    }

    /// Omitting the column on create is fine.
    pub fn optional_on_create(&self) -> bool {
        self.nullable || self.default.is_some() || self.server_assigned()
    }
}

/// One arm of a polymorphic reference: discriminator value and the entity it selects.
#[derive(Clone, Debug, Serialize)]
pub struct PolymorphicTarget {
    pub discriminator: String,
    pub path_segment: String,
    pub key_column: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PolymorphicRef {
    pub id_column: String,
    pub type_column: String,
    pub targets: Vec<PolymorphicTarget>,
    pub verify: bool,
}

impl PolymorphicRef {
    pub fn target(&self, discriminator: &str) -> Option<&PolymorphicTarget> {
        self.targets.iter().find(|t| t.discriminator == discriminator)
    }
}

/// A row set in another entity that references this entity, and what deleting us does to it.
#[derive(Clone, Debug)]
pub struct Dependent {
    pub path_segment: String,
    /// Referencing column in the dependent entity.
    pub column: String,
    /// Our column whose value the dependent stores.
    pub referenced_column: String,
    /// For polymorphic references: (discriminator column, value that selects us).
    pub discriminator: Option<(String, String)>,
    pub policy: DeletePolicy,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub key_columns: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub unique: Vec<Vec<String>>,
    pub operations: HashSet<Operation>,
    pub update_columns: Vec<String>,
    pub validation: HashMap<String, ValidationRule>,
    pub ascending_pairs: Vec<(String, String)>,
    pub polymorphic: Vec<PolymorphicRef>,
    pub dependents: Vec<Dependent>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn key_info(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.key_columns.iter().filter_map(|k| self.column(k))
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn is_updatable(&self, column: &str) -> bool {
        self.update_columns.iter().any(|c| c == column)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub schema_name: String,
    /// Enum name -> values, in catalog order.
    pub enums: Vec<(String, Vec<String>)>,
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
