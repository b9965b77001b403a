use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("{operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("counter row with id 1 is missing")]
    MissingCounterRow,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Pooled access to the visit counter. Implementations are shared across
/// concurrent requests without external locking.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create the visits table and seed the counter row if missing
    async fn init(&self) -> StorageResult<()>;

    /// Check that a pooled connection can reach the database
    async fn ping(&self) -> StorageResult<()>;

    /// Atomically increment the counter, returning rows affected
    async fn increment_counter(&self) -> StorageResult<u64>;

    /// Read the current counter value
    async fn counter(&self) -> StorageResult<i32>;
}
