//! FlightSurety Insurance Module
//!
//! Passenger-facing side of the ledger:
//! - Flight registry for funded airlines
//! - Premium escrow and the 1.5x credit sweep
//! - Settlement of agreed flight statuses
//! - Credit withdrawal through a payout rail
//! - Genesis bootstrap

pub mod registry;
pub mod ledger;
pub mod payout;
pub mod settlement;
pub mod genesis;

pub use registry::*;
pub use ledger::*;
pub use payout::*;
pub use settlement::*;
pub use genesis::*;
