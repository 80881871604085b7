//! PostgreSQL backend over a sqlx pool.

use crate::config::ResolvedEntity;
use crate::error::{AppError, ConfigError};
use crate::sql::{self, bind_all, QueryBuf};
use crate::store::{RefFilter, Row, RowStore, StoreTx};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, PgExecutor, PgPool, Postgres, Row as _, Transaction};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_object(row: &PgRow) -> Result<Row, AppError> {
    match row.try_get::<Value, _>(0)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Db(sqlx::Error::Decode(
            format!("expected a JSON object row, got {}", other).into(),
        ))),
    }
}

async fn fetch_rows<'c, E>(executor: E, q: &QueryBuf) -> Result<Vec<Row>, AppError>
where
    E: PgExecutor<'c>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_all(&q.sql, &q.params).fetch_all(executor).await?;
    rows.iter().map(row_object).collect()
}

#[async_trait]
impl RowStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError> {
        fetch_rows(&self.pool, &sql::select_all(entity)).await
    }

    async fn fetch(&self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError> {
        let rows = fetch_rows(&self.pool, &sql::select_by_key(entity, key, false)).await?;
        Ok(rows.into_iter().next())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn fetch(
        &mut self,
        entity: &ResolvedEntity,
        key: &[Value],
        lock: bool,
    ) -> Result<Option<Row>, AppError> {
        let rows = fetch_rows(&mut *self.tx, &sql::select_by_key(entity, key, lock)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&mut self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let rows = fetch_rows(&mut *self.tx, &sql::insert(entity, row)).await?;
        rows.into_iter()
            .next()
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(
        &mut self,
        entity: &ResolvedEntity,
        key: &[Value],
        changes: &Row,
    ) -> Result<Option<Row>, AppError> {
        let rows = fetch_rows(&mut *self.tx, &sql::update(entity, key, changes)).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&mut self, entity: &ResolvedEntity, key: &[Value]) -> Result<Option<Row>, AppError> {
        let rows = fetch_rows(&mut *self.tx, &sql::delete(entity, key)).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<Vec<Row>, AppError> {
        fetch_rows(&mut *self.tx, &sql::delete_where(entity, filter)).await
    }

    async fn set_null_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<u64, AppError> {
        let q = sql::set_null_where(entity, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(&q.sql, &q.params).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn count_where(
        &mut self,
        entity: &ResolvedEntity,
        filter: &RefFilter<'_>,
    ) -> Result<u64, AppError> {
        let q = sql::count_where(entity, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_one(&mut *self.tx).await?;
        let n: i64 = row.try_get(0)?;
        Ok(n.max(0) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn connect_options(database_url: &str) -> Result<PgConnectOptions, ConfigError> {
    PgConnectOptions::from_str(database_url).map_err(|e| ConfigError::Setting {
        name: "DATABASE_URL",
        message: e.to_string(),
    })
}

/// Pool whose sessions run in UTC, so `row_to_json` renders `timestamptz` with a `+00:00` offset.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let options = connect_options(database_url)?.options([("TimeZone", "UTC")]);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Connect to the maintenance database and create the target database if it is missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let mut conn = connect_options(&admin_url)?.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[after_scheme..]
        .find('/')
        .map(|i| after_scheme + i + 1)
        .ok_or_else(|| ConfigError::Setting {
            name: "DATABASE_URL",
            message: "no database path".into(),
        })?;
    let path_and_query = &url[path_start..];
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((db, q)) => (db.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let mut admin_url = format!("{}postgres", &url[..path_start]);
    if let Some(q) = query {
        admin_url.push('?');
        admin_url.push_str(q);
    }
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
