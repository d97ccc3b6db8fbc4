//! Sled-backed durable store
//! Lazy open with one cached handle shared by every partition; blocking
//! sled calls run on the blocking pool so async callers never stall

use async_trait::async_trait;
use sled::Db;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tokio::task;

use crate::partitions::Partition;
use crate::store::backend::StorageBackend;
use crate::store::error::{StoreError, StoreResult};

/// Size and record-count diagnostics for the whole database
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub size_on_disk: u64,
    pub record_count: u64,
}

/// Durable key-value store over a single sled database.
///
/// The handle is opened lazily on first use and cached; concurrent callers
/// share the one in-flight open, and an open failure propagates to every
/// caller waiting on it. Each [`Partition`] maps to a sled tree, declared
/// up front at open time.
pub struct DurableStore {
    path: PathBuf,
    partitions: Vec<Partition>,
    db: OnceCell<Db>,
}

impl DurableStore {
    /// Create a store rooted at `path`, declaring `partitions` at open time.
    ///
    /// No I/O happens here - the database opens on the first operation (or
    /// an explicit `init()`).
    pub fn new(path: impl Into<PathBuf>, partitions: &[Partition]) -> Self {
        Self {
            path: path.into(),
            partitions: partitions.to_vec(),
            db: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database if needed and return the cached handle.
    async fn handle(&self) -> StoreResult<Db> {
        let db = self
            .db
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let partitions = self.partitions.clone();
                task::spawn_blocking(move || -> StoreResult<Db> {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let db = sled::open(&path).map_err(|source| StoreError::Open {
                        path: path.clone(),
                        source,
                    })?;
                    for partition in &partitions {
                        db.open_tree(partition.name())?;
                    }
                    tracing::debug!(path = %path.display(), "opened durable store");
                    Ok(db)
                })
                .await
                .map_err(|_| StoreError::TaskJoin)?
            })
            .await?;
        Ok(db.clone())
    }

    /// Flush all pending writes to disk.
    pub async fn flush(&self) -> StoreResult<()> {
        let db = self.handle().await?;
        task::spawn_blocking(move || -> StoreResult<()> {
            db.flush()?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }

    /// Size-on-disk and total record count across all partitions.
    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let db = self.handle().await?;
        let partitions = self.partitions.clone();
        task::spawn_blocking(move || -> StoreResult<StoreStats> {
            let mut record_count = 0u64;
            for partition in &partitions {
                record_count += db.open_tree(partition.name())?.len() as u64;
            }
            Ok(StoreStats {
                size_on_disk: db.size_on_disk()?,
                record_count,
            })
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }
}

#[async_trait]
impl StorageBackend for DurableStore {
    async fn init(&self) -> StoreResult<()> {
        self.handle().await.map(|_| ())
    }

    async fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<String>> {
        let db = self.handle().await?;
        let key = key.to_owned();
        task::spawn_blocking(move || -> StoreResult<Option<String>> {
            let tree = db.open_tree(partition.name())?;
            match tree.get(key.as_bytes())? {
                Some(bytes) => {
                    let text =
                        String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::Corrupt {
                            partition: partition.name().to_string(),
                            key: key.clone(),
                        })?;
                    Ok(Some(text))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }

    async fn set(&self, partition: Partition, key: &str, value: String) -> StoreResult<()> {
        let db = self.handle().await?;
        let key = key.to_owned();
        task::spawn_blocking(move || -> StoreResult<()> {
            let tree = db.open_tree(partition.name())?;
            tree.insert(key.as_bytes(), value.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }

    async fn remove(&self, partition: Partition, key: &str) -> StoreResult<()> {
        let db = self.handle().await?;
        let key = key.to_owned();
        task::spawn_blocking(move || -> StoreResult<()> {
            let tree = db.open_tree(partition.name())?;
            tree.remove(key.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }

    async fn clear(&self, partition: Partition) -> StoreResult<()> {
        let db = self.handle().await?;
        task::spawn_blocking(move || -> StoreResult<()> {
            let tree = db.open_tree(partition.name())?;
            tree.clear()?;
            tree.flush()?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskJoin)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitions;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = DurableStore::new(dir.path().join("state.db"), partitions::ALL);

        store
            .set(partitions::SETTINGS, "state", "v1".to_string())
            .await
            .unwrap();
        let value = store.get(partitions::SETTINGS, "state").await.unwrap();
        assert_eq!(value, Some("v1".to_string()));

        // Upsert overwrites.
        store
            .set(partitions::SETTINGS, "state", "v2".to_string())
            .await
            .unwrap();
        let value = store.get(partitions::SETTINGS, "state").await.unwrap();
        assert_eq!(value, Some("v2".to_string()));

        store.remove(partitions::SETTINGS, "state").await.unwrap();
        let value = store.get(partitions::SETTINGS, "state").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_missing_record_is_none_not_error() {
        let dir = tempdir().unwrap();
        let store = DurableStore::new(dir.path().join("state.db"), partitions::ALL);
        let value = store.get(partitions::NOTES, "state").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let dir = tempdir().unwrap();
        let store = DurableStore::new(dir.path().join("state.db"), partitions::ALL);

        store
            .set(partitions::CHATS, "state", "chats".to_string())
            .await
            .unwrap();
        store
            .set(partitions::NOTES, "state", "notes".to_string())
            .await
            .unwrap();

        store.clear(partitions::CHATS).await.unwrap();
        assert_eq!(store.get(partitions::CHATS, "state").await.unwrap(), None);
        assert_eq!(
            store.get(partitions::NOTES, "state").await.unwrap(),
            Some("notes".to_string())
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = DurableStore::new(&path, partitions::ALL);
            store
                .set(partitions::TIMETABLES, "state", "persisted".to_string())
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let store = DurableStore::new(&path, partitions::ALL);
        let value = store.get(partitions::TIMETABLES, "state").await.unwrap();
        assert_eq!(value, Some("persisted".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_init_shares_one_handle() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DurableStore::new(dir.path().join("state.db"), partitions::ALL));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move { store.init().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.record_count, 0);
    }

    #[tokio::test]
    async fn test_stats_counts_records() {
        let dir = tempdir().unwrap();
        let store = DurableStore::new(dir.path().join("state.db"), partitions::ALL);

        store
            .set(partitions::COURSES, "state", "a".to_string())
            .await
            .unwrap();
        store
            .set(partitions::CHATS, "state", "b".to_string())
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.record_count, 2);
    }
}
