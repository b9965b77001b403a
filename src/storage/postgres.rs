use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool};
use std::sync::Arc;
use std::time::Duration;

use super::{
    bounded, Storage, StorageError, StorageResult, CREATE_VISITS_TABLE, INCREMENT_COUNTER,
    SEED_COUNTER_ROW, SELECT_COUNTER,
};
use crate::config::DatabaseConfig;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
    statement_timeout: Duration,
}

impl PostgresStorage {
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        let options = config
            .database_options()
            .map_err(|source| StorageError::Database {
                operation: "parse connect options",
                source,
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|source| StorageError::Database {
                operation: "open pool",
                source,
            })?;

        Ok(Self {
            pool: Arc::new(pool),
            statement_timeout: config.statement_timeout(),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> StorageResult<()> {
        bounded(
            "create visits table",
            self.statement_timeout,
            sqlx::query(CREATE_VISITS_TABLE).execute(self.pool.as_ref()),
        )
        .await?;

        bounded(
            "seed counter row",
            self.statement_timeout,
            sqlx::query(SEED_COUNTER_ROW).execute(self.pool.as_ref()),
        )
        .await?;

        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        bounded("ping", self.statement_timeout, async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
    }

    async fn increment_counter(&self) -> StorageResult<u64> {
        let result = bounded(
            "increment counter",
            self.statement_timeout,
            sqlx::query(INCREMENT_COUNTER).execute(self.pool.as_ref()),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::MissingCounterRow);
        }

        Ok(result.rows_affected())
    }

    async fn counter(&self) -> StorageResult<i32> {
        bounded(
            "read counter",
            self.statement_timeout,
            sqlx::query_scalar::<_, i32>(SELECT_COUNTER).fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or(StorageError::MissingCounterRow)
    }
}
