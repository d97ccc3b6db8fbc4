//! Storage backend contract
//! The middleware talks to storage only through this trait, so tests can
//! substitute an in-memory fake for the sled-backed store

use async_trait::async_trait;

use crate::partitions::Partition;
use crate::store::error::StoreResult;

/// Asynchronous, partitioned key-value storage.
///
/// Implementations must not block the caller's thread of execution; a
/// missing record is `Ok(None)`, never an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open (or create) the underlying database and declare every
    /// registered partition. Idempotent; concurrent callers share one
    /// in-flight open and one cached handle.
    async fn init(&self) -> StoreResult<()>;

    /// Fetch the record stored under `(partition, key)`.
    async fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<String>>;

    /// Upsert the record stored under `(partition, key)`.
    async fn set(&self, partition: Partition, key: &str, value: String) -> StoreResult<()>;

    /// Delete the record stored under `(partition, key)`.
    async fn remove(&self, partition: Partition, key: &str) -> StoreResult<()>;

    /// Drop every record in a partition.
    async fn clear(&self, partition: Partition) -> StoreResult<()>;
}
