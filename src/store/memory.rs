//! In-memory storage backend
//! Backs tests and embedded use; same contract as the sled store, no disk

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::partitions::Partition;
use crate::store::backend::StorageBackend;
use crate::store::error::StoreResult;

/// HashMap-based backend keyed by `(partition, key)`.
///
/// Records are held behind an `RwLock`; no operation suspends, so the lock
/// is never held across an await point.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all partitions.
    pub fn record_count(&self) -> usize {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Seed a record directly, bypassing the async contract. Test helper.
    pub fn seed(&self, partition: Partition, key: &str, value: impl Into<String>) {
        self.records
            .write()
            .expect("lock poisoned")
            .entry(partition.name().to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<String>> {
        let records = self.records.read().expect("lock poisoned");
        Ok(records
            .get(partition.name())
            .and_then(|bucket| bucket.get(key))
            .cloned())
    }

    async fn set(&self, partition: Partition, key: &str, value: String) -> StoreResult<()> {
        let mut records = self.records.write().expect("lock poisoned");
        records
            .entry(partition.name().to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, partition: Partition, key: &str) -> StoreResult<()> {
        let mut records = self.records.write().expect("lock poisoned");
        if let Some(bucket) = records.get_mut(partition.name()) {
            bucket.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, partition: Partition) -> StoreResult<()> {
        let mut records = self.records.write().expect("lock poisoned");
        records.remove(partition.name());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("record_count", &self.record_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitions;

    #[tokio::test]
    async fn test_backend_contract() {
        let backend = MemoryBackend::new();
        backend.init().await.unwrap();

        assert_eq!(backend.get(partitions::CHATS, "state").await.unwrap(), None);

        backend
            .set(partitions::CHATS, "state", "hello".to_string())
            .await
            .unwrap();
        assert_eq!(
            backend.get(partitions::CHATS, "state").await.unwrap(),
            Some("hello".to_string())
        );

        backend.remove(partitions::CHATS, "state").await.unwrap();
        assert_eq!(backend.get(partitions::CHATS, "state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_partition() {
        let backend = MemoryBackend::new();
        backend.seed(partitions::CHATS, "state", "a");
        backend.seed(partitions::NOTES, "state", "b");

        backend.clear(partitions::CHATS).await.unwrap();
        assert_eq!(backend.get(partitions::CHATS, "state").await.unwrap(), None);
        assert_eq!(
            backend.get(partitions::NOTES, "state").await.unwrap(),
            Some("b".to_string())
        );
        assert_eq!(backend.record_count(), 1);
    }
}
