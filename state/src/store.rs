//! Core state store traits and types

use async_trait::async_trait;
use flightsurety_core::{Hash, StateMutator, StateProvider, StateRoot, SuretyResult};
use flightsurety_crypto::hashing::{hash_multiple, merkle_root};

/// State entry for merkle tree computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StateEntry {
    pub fn hash(&self) -> Hash {
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart
        let key_len = (self.key.len() as u64).to_le_bytes();
        hash_multiple(&[&key_len, &self.key, &self.value])
    }
}

/// Compute state root from entries
pub fn compute_state_root(entries: &[StateEntry]) -> StateRoot {
    if entries.is_empty() {
        return Hash::ZERO;
    }

    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let leaves: Vec<Hash> = sorted.iter().map(|e| e.hash()).collect();
    merkle_root(&leaves)
}

/// Abstract ledger store interface
#[async_trait]
pub trait StateStore: StateProvider + StateMutator {
    /// Get all entries for state root computation
    async fn all_entries(&self) -> SuretyResult<Vec<StateEntry>>;

    /// Compute current state root
    async fn compute_root(&self) -> SuretyResult<StateRoot> {
        let entries = self.all_entries().await?;
        Ok(compute_state_root(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &[u8], value: &[u8]) -> StateEntry {
        StateEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn test_state_root_order_independent() {
        let a = vec![entry(b"key1", b"value1"), entry(b"key2", b"value2")];
        let b = vec![entry(b"key2", b"value2"), entry(b"key1", b"value1")];

        assert_eq!(compute_state_root(&a), compute_state_root(&b));
        assert_eq!(compute_state_root(&[]), Hash::ZERO);
    }

    #[test]
    fn test_entry_hash_separates_key_and_value() {
        assert_ne!(entry(b"ab", b"c").hash(), entry(b"a", b"bc").hash());
    }
}
