//! FlightSurety Ledger Store
//!
//! Provides ledger storage, versioning, and state root computation.
//! Uses a key-value model where state = { key → value }; typed records for
//! airlines, flights, premiums and credit are layered on top, and every
//! operation stages its writes before committing them as one batch.

pub mod store;
pub mod records;
pub mod staged;
pub mod memory;
pub mod persistent;
pub mod backend;

pub use store::*;
pub use records::*;
pub use staged::*;
pub use memory::*;
pub use persistent::*;
pub use backend::*;
