//! phobo-server: reads settings, prepares the store, serves the API.

use phobo::{
    app, apply_schema, connect_pool, ensure_database_exists, resolve, AppState, MemoryStore, PgStore, RowStore, Settings,
    StoreKind,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("phobo=info,phobo_server=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let model = resolve(&settings.catalog()?)?;
    tracing::info!(entities = model.entities.len(), schema = %model.schema_name, "catalog resolved");

    let store: Arc<dyn RowStore> = match settings.store {
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = connect_pool(&settings.database_url, settings.db_max_connections).await?;
            if settings.apply_schema {
                apply_schema(&pool, &model).await?;
            }
            Arc::new(PgStore::new(pool))
        }
    };

    let app = app(AppState::new(store, model), settings.body_limit_bytes);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
