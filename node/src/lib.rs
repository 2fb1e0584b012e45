//! FlightSurety Node Implementation
//!
//! Combines the ledger store and engines behind:
//! - A serialized runtime that commits each operation atomically
//! - A simulated oracle fleet
//! - HTTP API

mod api;
mod node;
mod oracles;
mod runtime;

pub use api::*;
pub use node::*;
pub use oracles::*;
pub use runtime::*;
