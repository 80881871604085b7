//! Runtime settings from environment variables.

use crate::config::{load_from_dir, social_catalog, FullConfig};
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store '{}' (expected postgres or memory)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub db_schema: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub catalog_path: Option<PathBuf>,
    pub store: StoreKind,
    pub verify_polymorphic_targets: bool,
    pub apply_schema: bool,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/phobo".into(),
            db_schema: "public".into(),
            db_max_connections: 5,
            bind_addr: "0.0.0.0:8000".into(),
            catalog_path: None,
            store: StoreKind::Postgres,
            verify_polymorphic_targets: false,
            apply_schema: true,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Setting {
            name,
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Setting {
        name,
        message: e.to_string(),
    })
}

impl Settings {
    /// Read from the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = Settings::default();
        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("DB_SCHEMA") {
            if v.trim().is_empty() {
                return Err(ConfigError::Setting {
                    name: "DB_SCHEMA",
                    message: "must not be empty".into(),
                });
            }
            s.db_schema = v.trim().to_string();
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            s.db_max_connections = parse("DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("CATALOG_PATH").filter(|v| !v.trim().is_empty()) {
            s.catalog_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("STORE") {
            s.store = parse("STORE", &v)?;
        }
        if let Some(v) = lookup("VERIFY_POLYMORPHIC_TARGETS") {
            s.verify_polymorphic_targets = parse_bool("VERIFY_POLYMORPHIC_TARGETS", &v)?;
        }
        if let Some(v) = lookup("APPLY_SCHEMA") {
            s.apply_schema = parse_bool("APPLY_SCHEMA", &v)?;
        }
        if let Some(v) = lookup("BODY_LIMIT_BYTES") {
            s.body_limit_bytes = parse("BODY_LIMIT_BYTES", &v)?;
        }
        Ok(s)
    }

    /// The catalog these settings select, with schema and verification overrides applied.
    pub fn catalog(&self) -> Result<FullConfig, ConfigError> {
        let mut config = match &self.catalog_path {
            Some(dir) => load_from_dir(dir)?,
            None => social_catalog()?,
        };
        config.schema = self.db_schema.clone();
        if self.verify_polymorphic_targets {
            config.verify_all_polymorphic();
        }
        Ok(config)
    }
}
