//! Phobo: catalog-driven CRUD backend for a social-networking data model.

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_dir, resolve, social_catalog, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use migration::apply_schema;
pub use routes::{app, common_routes, common_routes_with_ready, entity_routes, meta_routes};
pub use service::{CrudService, RowKey};
pub use settings::{Settings, StoreKind};
pub use state::AppState;
pub use store::{connect_pool, ensure_database_exists, MemoryStore, PgStore, Row, RowStore};
