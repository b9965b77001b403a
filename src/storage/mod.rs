pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseBackend, DatabaseConfig};

pub(crate) const CREATE_VISITS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS visits (id integer PRIMARY KEY, counter integer)";

pub(crate) const SEED_COUNTER_ROW: &str =
    "INSERT INTO visits (id, counter) VALUES (1, 0) ON CONFLICT (id) DO NOTHING";

pub(crate) const INCREMENT_COUNTER: &str = "UPDATE visits SET counter = counter + 1 WHERE id = 1";

pub(crate) const SELECT_COUNTER: &str = "SELECT counter FROM visits WHERE id = 1";

/// Open a connection pool to the configured target database
pub async fn open(config: &DatabaseConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Postgres => Arc::new(PostgresStorage::new(config).await?),
        DatabaseBackend::Sqlite => Arc::new(SqliteStorage::new(config).await?),
    };
    Ok(storage)
}

/// Run a database operation under a deadline. Dropping the timed-out future
/// releases its pooled connection.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> StorageResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(StorageError::Database { operation, source }),
        Err(_) => Err(StorageError::Timeout { operation }),
    }
}
