//! Startup provisioning of the target database and the visits schema.
//!
//! Runs in two phases: `ensure_database` creates the target database through
//! a server-level connection when it is missing (postgres only), then
//! `ensure_schema` creates the table and seed row inside it. The schema phase
//! runs on every startup, whether or not the database already existed, and
//! both phases are idempotent.

use sqlx::{Connection, PgConnection};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::storage::{self, Storage, StorageError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("wrong database config: {0}")]
    Config(#[source] sqlx::Error),
    #[error("unable to reach database server: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("unable to look up database {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("could not create database {name}: {source}")]
    CreateDatabase {
        name: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("{stage} timed out")]
    Timeout { stage: &'static str },
    #[error("unable to create connection pool: {0}")]
    Open(#[source] StorageError),
    #[error("could not create schema: {0}")]
    Schema(#[source] StorageError),
}

/// A provisioned database together with the pool opened on it
pub struct Provisioned {
    pub storage: Arc<dyn Storage>,
    pub database_created: bool,
}

/// Ensure the target database and schema exist, then hand back the pool
pub async fn provision(config: &DatabaseConfig) -> Result<Provisioned, ProvisionError> {
    let database_created = ensure_database(config).await?;

    let storage = storage::open(config).await.map_err(ProvisionError::Open)?;
    ensure_schema(storage.as_ref()).await?;

    info!(
        database = %config.name,
        database_created,
        "Database provisioned"
    );

    Ok(Provisioned {
        storage,
        database_created,
    })
}

/// Create the target database if it does not exist. Returns whether it was
/// created. SQLite databases are created on connect, so this is a no-op there.
pub async fn ensure_database(config: &DatabaseConfig) -> Result<bool, ProvisionError> {
    match config.backend {
        DatabaseBackend::Postgres => ensure_postgres_database(config).await,
        DatabaseBackend::Sqlite => Ok(false),
    }
}

/// Create the visits table and seed row `(1, 0)` when missing
pub async fn ensure_schema(storage: &dyn Storage) -> Result<(), ProvisionError> {
    storage.init().await.map_err(ProvisionError::Schema)
}

async fn ensure_postgres_database(config: &DatabaseConfig) -> Result<bool, ProvisionError> {
    let limit = config.statement_timeout();
    let options = config.server_options().map_err(ProvisionError::Config)?;

    let mut conn = within("connect", limit, PgConnection::connect_with(&options))
        .await?
        .map_err(ProvisionError::Connect)?;

    let existing: Option<String> = within(
        "database lookup",
        limit,
        sqlx::query_scalar("SELECT datname FROM pg_catalog.pg_database WHERE datname = $1")
            .bind(&config.name)
            .fetch_optional(&mut conn),
    )
    .await?
    .map_err(|source| ProvisionError::Lookup {
        name: config.name.clone(),
        source,
    })?;

    if existing.is_some() {
        close_server_connection(conn).await;
        return Ok(false);
    }

    info!(database = %config.name, "Creating database");
    within(
        "create database",
        limit,
        sqlx::query(&create_database_statement(&config.name)).execute(&mut conn),
    )
    .await?
    .map_err(|source| ProvisionError::CreateDatabase {
        name: config.name.clone(),
        source,
    })?;

    close_server_connection(conn).await;
    Ok(true)
}

async fn close_server_connection(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        warn!(operation = "close server connection", error = %err, "Failed to close connection");
    }
}

async fn within<T, F>(stage: &'static str, limit: Duration, fut: F) -> Result<T, ProvisionError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProvisionError::Timeout { stage })
}

/// `CREATE DATABASE` takes no bind parameters, so the name is quoted as an
/// identifier.
fn create_database_statement(name: &str) -> String {
    format!("CREATE DATABASE \"{}\"", name.replace('"', "\"\""))
}
