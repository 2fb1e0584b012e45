//! Store selected by configuration

use async_trait::async_trait;
use flightsurety_core::{
    StateChange, StateMutator, StateProvider, StateVersion, StorageBackend, SuretyResult,
};
use std::path::Path;
use tracing::info;

use crate::memory::MemoryStateStore;
use crate::persistent::PersistentStateStore;
use crate::store::{StateEntry, StateStore};

/// Ledger store behind either backend
pub enum LedgerStore {
    Memory(MemoryStateStore),
    Persistent(PersistentStateStore),
}

impl LedgerStore {
    /// Open the configured backend; sled data lives under `data_dir/ledger`
    pub fn open(backend: StorageBackend, data_dir: impl AsRef<Path>) -> SuretyResult<Self> {
        match backend {
            StorageBackend::Memory => {
                info!("Using in-memory ledger store");
                Ok(LedgerStore::Memory(MemoryStateStore::new()))
            }
            StorageBackend::Sled => {
                let path = data_dir.as_ref().join("ledger");
                info!("Using sled ledger store at {}", path.display());
                Ok(LedgerStore::Persistent(PersistentStateStore::open(path)?))
            }
        }
    }

    pub fn memory() -> Self {
        LedgerStore::Memory(MemoryStateStore::new())
    }

    fn inner(&self) -> &dyn StateStore {
        match self {
            LedgerStore::Memory(store) => store,
            LedgerStore::Persistent(store) => store,
        }
    }

    /// Read-only view for staging
    pub fn provider(&self) -> &dyn StateProvider {
        match self {
            LedgerStore::Memory(store) => store,
            LedgerStore::Persistent(store) => store,
        }
    }
}

#[async_trait]
impl StateProvider for LedgerStore {
    async fn version(&self) -> StateVersion {
        self.inner().version().await
    }

    async fn get(&self, key: &[u8]) -> SuretyResult<Option<Vec<u8>>> {
        self.inner().get(key).await
    }

    async fn exists(&self, key: &[u8]) -> SuretyResult<bool> {
        self.inner().exists(key).await
    }
}

#[async_trait]
impl StateMutator for LedgerStore {
    async fn set(&self, key: &[u8], value: &[u8]) -> SuretyResult<()> {
        self.inner().set(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> SuretyResult<()> {
        self.inner().delete(key).await
    }

    async fn apply_batch(&self, changes: Vec<StateChange>) -> SuretyResult<StateVersion> {
        self.inner().apply_batch(changes).await
    }
}

#[async_trait]
impl StateStore for LedgerStore {
    async fn all_entries(&self) -> SuretyResult<Vec<StateEntry>> {
        self.inner().all_entries().await
    }
}
