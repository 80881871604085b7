//! Raw catalog types matching the JSON documents under `catalog/`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumConfig {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.as_str()],
            PrimaryKeyConfig::Composite(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    pub primary_key: PrimaryKeyConfig,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
    Enum {
        #[serde(rename = "enum")]
        enum_name: String,
    },
}

/// Column default: a JSON literal or a server-side expression (only `now` is known).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ColumnDefaultConfig {
    Value(serde_json::Value),
    Expression(String),
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Object(mut obj) => {
                if let Some(expr) = obj.remove("expression") {
                    if let serde_json::Value::String(s) = expr {
                        return Ok(ColumnDefaultConfig::Expression(s));
                    }
                    return Err(serde::de::Error::custom("default expression must be a string"));
                }
                if let Some(lit) = obj.remove("value") {
                    return Ok(ColumnDefaultConfig::Value(lit));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be {{ \"value\": ... }} or {{ \"expression\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be an object; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

pub(crate) fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    /// Server-generated key value; never accepted from clients.
    #[serde(default)]
    pub identity: bool,
    /// Server-assigned column; not part of create or update payloads.
    #[serde(default)]
    pub readonly: bool,
    /// Set to the current time on every update.
    #[serde(default)]
    pub touch_on_update: bool,
}

fn default_true() -> bool {
    true
}

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Referencing rows are left in place with a dangling reference.
    #[default]
    Orphan,
    /// Referencing rows are deleted, recursively applying their own policies.
    Cascade,
    /// The delete fails with a conflict while referencing rows exist.
    Restrict,
    /// The referencing column is cleared. Requires a nullable column.
    SetNull,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    #[serde(default)]
    pub on_delete: DeletePolicy,
}

/// A reference that points into one of several tables, chosen by a discriminator column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolymorphicConfig {
    pub id: String,
    pub table: String,
    pub id_column: String,
    pub type_column: String,
    /// Discriminator value -> target table id.
    pub targets: BTreeMap<String, String>,
    /// Check that the referenced row exists inside the writing transaction.
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub on_delete: DeletePolicy,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

fn all_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    #[serde(default = "all_operations")]
    pub operations: Vec<Operation>,
    /// Columns accepted by updates. When absent: every non-key, non-server-assigned column.
    #[serde(default)]
    pub update_columns: Option<Vec<String>>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    /// Column pairs whose values must be strictly ascending on create (e.g. friendship pairs).
    #[serde(default)]
    pub ascending_pairs: Vec<[String; 2]>,
}

/// The whole catalog in one struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub enums: Vec<EnumConfig>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    #[serde(default)]
    pub polymorphic: Vec<PolymorphicConfig>,
    #[serde(default)]
    pub api_entities: Vec<ApiEntityConfig>,
}

pub fn default_schema() -> String {
    "public".into()
}

impl Default for FullConfig {
    fn default() -> Self {
        FullConfig {
            schema: default_schema(),
            enums: Vec::new(),
            tables: Vec::new(),
            relationships: Vec::new(),
            polymorphic: Vec::new(),
            api_entities: Vec::new(),
        }
    }
}

impl FullConfig {
    /// Turn on existence checks for every polymorphic reference.
    pub fn verify_all_polymorphic(&mut self) {
        for p in &mut self.polymorphic {
            p.verify = true;
        }
    }
}
