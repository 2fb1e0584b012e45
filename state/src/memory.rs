//! In-memory ledger store for testing and ephemeral nodes

use async_trait::async_trait;
use dashmap::DashMap;
use flightsurety_core::{StateChange, StateMutator, StateProvider, StateVersion, SuretyResult};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::store::{StateEntry, StateStore};

/// In-memory ledger store
pub struct MemoryStateStore {
    data: DashMap<Vec<u8>, Vec<u8>>,
    version: RwLock<StateVersion>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            version: RwLock::new(StateVersion::new(0)),
        }
    }

    pub fn with_data(data: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        let store = Self::new();
        for (key, value) in data {
            store.data.insert(key, value);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateProvider for MemoryStateStore {
    async fn version(&self) -> StateVersion {
        *self.version.read()
    }

    async fn get(&self, key: &[u8]) -> SuretyResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    async fn exists(&self, key: &[u8]) -> SuretyResult<bool> {
        Ok(self.data.contains_key(key))
    }
}

#[async_trait]
impl StateMutator for MemoryStateStore {
    async fn set(&self, key: &[u8], value: &[u8]) -> SuretyResult<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> SuretyResult<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn apply_batch(&self, changes: Vec<StateChange>) -> SuretyResult<StateVersion> {
        // Holding the version lock keeps concurrent batches from interleaving
        let mut version = self.version.write();

        for change in changes {
            match change {
                StateChange::Set { key, value } => {
                    self.data.insert(key, value);
                }
                StateChange::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }

        *version = version.next();
        Ok(*version)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn all_entries(&self) -> SuretyResult<Vec<StateEntry>> {
        Ok(self
            .data
            .iter()
            .map(|entry| StateEntry {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect())
    }
}

/// Thread-safe memory store wrapper
pub type SharedMemoryStateStore = Arc<MemoryStateStore>;

/// Create a shared memory state store
pub fn create_memory_store() -> SharedMemoryStateStore {
    Arc::new(MemoryStateStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightsurety_core::Hash;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();

        store.set(b"key1", b"value1").await.unwrap();
        assert_eq!(store.get(b"key1").await.unwrap(), Some(b"value1".to_vec()));

        store.delete(b"key1").await.unwrap();
        assert_eq!(store.get(b"key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_batch() {
        let store = MemoryStateStore::with_data(vec![(b"gone".to_vec(), b"x".to_vec())]);

        let changes = vec![
            StateChange::Set {
                key: b"k1".to_vec(),
                value: b"v1".to_vec(),
            },
            StateChange::Delete {
                key: b"gone".to_vec(),
            },
        ];

        let version = store.apply_batch(changes).await.unwrap();
        assert_eq!(version.0, 1);
        assert_eq!(store.version().await, version);

        assert!(store.exists(b"k1").await.unwrap());
        assert!(!store.exists(b"gone").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_root_tracks_content() {
        let store = MemoryStateStore::new();
        assert_eq!(store.compute_root().await.unwrap(), Hash::ZERO);

        store.set(b"a", b"1").await.unwrap();
        let root = store.compute_root().await.unwrap();
        assert_ne!(root, Hash::ZERO);

        store.set(b"a", b"2").await.unwrap();
        assert_ne!(store.compute_root().await.unwrap(), root);
    }
}
