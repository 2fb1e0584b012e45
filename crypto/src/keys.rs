//! Key management for FlightSurety
//!
//! Account identities (airlines, passengers, oracles) are BLAKE3 hashes of
//! Ed25519 public keys.

use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use flightsurety_core::{Address, PublicKey, SuretyError, SuretyResult};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::hashing::blake3_hash;

/// A keypair identifying one account
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create keypair from seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create keypair from secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> SuretyResult<Self> {
        let seed: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            SuretyError::InvalidAddress(format!(
                "secret key must be {} bytes, got {}",
                SECRET_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the address (hash of public key)
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// Derive address from public key using BLAKE3 hash
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let hash = blake3_hash(public_key.as_bytes());
    Address::from_bytes(*hash.as_bytes())
}

/// Verify that an address matches a public key
pub fn verify_address(address: &Address, public_key: &PublicKey) -> bool {
    address == &address_from_public_key(public_key)
}

/// Serializable public key info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    pub public_key: String,
    pub address: String,
}

impl From<&KeyPair> for PublicKeyInfo {
    fn from(keypair: &KeyPair) -> Self {
        Self {
            public_key: keypair.public_key().to_hex(),
            address: keypair.address().to_hex(),
        }
    }
}
