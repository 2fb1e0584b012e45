//! FlightSurety Consensus Engines
//!
//! Two quorum mechanisms share this crate:
//! - Airline membership: direct admission below a threshold, majority ballots above it
//! - Flight status attestation: reporters on matching watch indexes agree on a status

pub mod attestation;
pub mod ballot;
pub mod index;
pub mod membership;
pub mod settlement;

pub use attestation::*;
pub use ballot::*;
pub use index::*;
pub use membership::*;
pub use settlement::*;
