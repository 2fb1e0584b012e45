//! Core traits defining FlightSurety interfaces
//!
//! The ledger store is a versioned key-value space; every component reads
//! through `StateProvider` and commits through `StateMutator::apply_batch`.

use crate::types::*;
use async_trait::async_trait;

/// Result type for FlightSurety operations
pub type SuretyResult<T> = Result<T, crate::error::SuretyError>;

/// Trait for hashable types
pub trait Hashable {
    /// Compute the hash of this object
    fn hash(&self) -> Hash;
}

/// State provider trait
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Get the current state version
    async fn version(&self) -> StateVersion;

    /// Get a value by key
    async fn get(&self, key: &[u8]) -> SuretyResult<Option<Vec<u8>>>;

    /// Check if a key exists
    async fn exists(&self, key: &[u8]) -> SuretyResult<bool>;
}

/// State mutator trait
#[async_trait]
pub trait StateMutator: StateProvider {
    /// Set a value
    async fn set(&self, key: &[u8], value: &[u8]) -> SuretyResult<()>;

    /// Delete a key
    async fn delete(&self, key: &[u8]) -> SuretyResult<()>;

    /// Apply a batch of changes atomically
    async fn apply_batch(&self, changes: Vec<StateChange>) -> SuretyResult<StateVersion>;
}

/// State change operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl StateChange {
    pub fn key(&self) -> &[u8] {
        match self {
            StateChange::Set { key, .. } | StateChange::Delete { key } => key,
        }
    }
}
