//! Persistent ledger store using sled database

use async_trait::async_trait;
use flightsurety_core::{
    StateChange, StateMutator, StateProvider, StateVersion, SuretyError, SuretyResult,
};
use parking_lot::RwLock;
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::store::{StateEntry, StateStore};

const STATE_TREE: &str = "ledger";
const META_TREE: &str = "meta";
const VERSION_KEY: &[u8] = b"version";

fn storage_err(e: sled::Error) -> SuretyError {
    SuretyError::StorageError(e.to_string())
}

/// Persistent ledger store backed by sled database
pub struct PersistentStateStore {
    db: Db,
    state: Tree,
    meta: Tree,
    version: RwLock<StateVersion>,
}

impl PersistentStateStore {
    pub fn open<P: AsRef<Path>>(path: P) -> SuretyResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        let state = db.open_tree(STATE_TREE).map_err(storage_err)?;
        let meta = db.open_tree(META_TREE).map_err(storage_err)?;

        // Load version from disk or start at 0
        let version = match meta.get(VERSION_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    SuretyError::StorageError("corrupt version entry".into())
                })?;
                StateVersion::new(u64::from_le_bytes(raw))
            }
            None => StateVersion::new(0),
        };

        debug!("Opened ledger store at version {}", version);

        Ok(Self {
            db,
            state,
            meta,
            version: RwLock::new(version),
        })
    }

    /// Number of ledger entries
    pub fn size_estimate(&self) -> u64 {
        self.state.len() as u64
    }
}

#[async_trait]
impl StateProvider for PersistentStateStore {
    async fn version(&self) -> StateVersion {
        *self.version.read()
    }

    async fn get(&self, key: &[u8]) -> SuretyResult<Option<Vec<u8>>> {
        self.state
            .get(key)
            .map(|opt| opt.map(|v| v.to_vec()))
            .map_err(storage_err)
    }

    async fn exists(&self, key: &[u8]) -> SuretyResult<bool> {
        self.state.contains_key(key).map_err(storage_err)
    }
}

#[async_trait]
impl StateMutator for PersistentStateStore {
    async fn set(&self, key: &[u8], value: &[u8]) -> SuretyResult<()> {
        self.state.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> SuretyResult<()> {
        self.state.remove(key).map_err(storage_err)?;
        Ok(())
    }

    async fn apply_batch(&self, changes: Vec<StateChange>) -> SuretyResult<StateVersion> {
        let mut version = self.version.write();
        let new_version = version.next();

        let mut batch = sled::Batch::default();
        for change in changes {
            match change {
                StateChange::Set { key, value } => batch.insert(key, value),
                StateChange::Delete { key } => batch.remove(key),
            }
        }

        self.state.apply_batch(batch).map_err(storage_err)?;
        self.meta
            .insert(VERSION_KEY, &new_version.0.to_le_bytes()[..])
            .map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;

        *version = new_version;
        Ok(new_version)
    }
}

#[async_trait]
impl StateStore for PersistentStateStore {
    async fn all_entries(&self) -> SuretyResult<Vec<StateEntry>> {
        self.state
            .iter()
            .map(|result| {
                result
                    .map(|(key, value)| StateEntry {
                        key: key.to_vec(),
                        value: value.to_vec(),
                    })
                    .map_err(storage_err)
            })
            .collect()
    }
}

/// Thread-safe persistent store wrapper
pub type SharedPersistentStateStore = Arc<PersistentStateStore>;

/// Create a shared persistent state store
pub fn create_persistent_store<P: AsRef<Path>>(
    path: P,
) -> SuretyResult<SharedPersistentStateStore> {
    Ok(Arc::new(PersistentStateStore::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persistent_store_basic() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStateStore::open(tmp.path()).unwrap();

        store.set(b"key1", b"value1").await.unwrap();
        assert_eq!(store.get(b"key1").await.unwrap(), Some(b"value1".to_vec()));

        store.delete(b"key1").await.unwrap();
        assert_eq!(store.get(b"key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persistent_store_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let store = PersistentStateStore::open(tmp.path()).unwrap();
            let changes = vec![
                StateChange::Set {
                    key: b"k1".to_vec(),
                    value: b"v1".to_vec(),
                },
                StateChange::Set {
                    key: b"k2".to_vec(),
                    value: b"v2".to_vec(),
                },
            ];
            store.apply_batch(changes).await.unwrap();
        }

        let store = PersistentStateStore::open(tmp.path()).unwrap();
        assert_eq!(store.get(b"k2").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.version().await.0, 1);
        assert_eq!(store.all_entries().await.unwrap().len(), 2);
    }
}
