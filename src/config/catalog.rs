//! Catalog sources: the built-in social-network catalog or a directory of JSON files.

use crate::config::FullConfig;
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::path::Path;

const ENUMS: &str = include_str!("../../catalog/enums.json");
const TABLES: &str = include_str!("../../catalog/tables.json");
const RELATIONSHIPS: &str = include_str!("../../catalog/relationships.json");
const POLYMORPHIC: &str = include_str!("../../catalog/polymorphic.json");
const API_ENTITIES: &str = include_str!("../../catalog/api_entities.json");

fn parse<T: DeserializeOwned>(file: &str, raw: &str) -> Result<T, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("{}: {}", file, e)))
}

/// The social-network catalog compiled into the binary.
pub fn social_catalog() -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        enums: parse("enums.json", ENUMS)?,
        tables: parse("tables.json", TABLES)?,
        relationships: parse("relationships.json", RELATIONSHIPS)?,
        polymorphic: parse("polymorphic.json", POLYMORPHIC)?,
        api_entities: parse("api_entities.json", API_ENTITIES)?,
        ..FullConfig::default()
    })
}

fn read_optional<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> Result<T, ConfigError> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse(file, &raw)
}

fn read_required<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T, ConfigError> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse(file, &raw)
}

/// Load a catalog laid out like `catalog/`. `tables.json` and `api_entities.json` are required.
pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    Ok(FullConfig {
        enums: read_optional(dir, "enums.json")?,
        tables: read_required(dir, "tables.json")?,
        relationships: read_optional(dir, "relationships.json")?,
        polymorphic: read_optional(dir, "polymorphic.json")?,
        api_entities: read_required(dir, "api_entities.json")?,
        ..FullConfig::default()
    })
}
