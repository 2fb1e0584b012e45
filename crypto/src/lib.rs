//! FlightSurety Cryptography Module
//!
//! Provides the primitives the ledger needs:
//! - Ed25519 key pairs, from which account addresses are derived
//! - BLAKE3 for keys and state roots (SHA-256 for index derivation)

pub mod keys;
pub mod hashing;

pub use keys::*;
pub use hashing::*;
