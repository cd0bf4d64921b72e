use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteQueryResult,
};
use sqlx::FromRow;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the persistence gateway. Driver errors are wrapped and never
/// escape to callers in their native form.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owned handle on the relational store.
///
/// The pool is created once at startup and injected into repositories at
/// construction; connections are checked out per statement and returned on
/// every exit path.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the store described by the configuration. The engine family
    /// comes from the URL scheme; only the embedded engine is supported, and
    /// the `users` table is provisioned on first connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let scheme = config.url.split(':').next().unwrap_or("");
        if scheme != "sqlite" {
            return Err(DatabaseError::UnsupportedEngine(scheme.to_string()));
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.provision_users().await?;

        info!(url = %config.url, "database connected");
        Ok(db)
    }

    async fn provision_users(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Borrowed pool for typed reads.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a parameterized statement. The result carries both the affected
    /// row count and the last inserted row id.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<SqliteQueryResult, DatabaseError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        Ok(query.execute(&self.pool).await?)
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Drop the pool. Mostly a test seam; a later `connect` builds a new one.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}

/// Canonical TEXT encoding for timestamps so range comparisons stay
/// lexicographically sound across write and query sites.
pub fn sql_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        // Structured values never reach the store in this application
        other => query.bind(other.to_string()),
    }
}

pub fn bind_value_as<'q, O>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>>
where
    O: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow>,
{
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}
