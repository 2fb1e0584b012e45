//! Ballot boxes for airline admission votes

use flightsurety_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const BALLOT_PREFIX: &[u8] = b"ballot:";

/// Ledger key of a candidate's ballot box
pub fn ballot_key(candidate: &Address) -> Vec<u8> {
    let mut key = BALLOT_PREFIX.to_vec();
    key.extend_from_slice(candidate.as_bytes());
    key
}

/// Distinct airlines endorsing one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotBox {
    voters: BTreeSet<Address>,
}

impl BallotBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vote (returns false if duplicate)
    pub fn add(&mut self, voter: Address) -> bool {
        self.voters.insert(voter)
    }

    pub fn contains(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    /// Check if enough distinct voters endorse the candidate
    pub fn has_quorum(&self, required: usize) -> bool {
        self.voters.len() >= required
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn voters(&self) -> impl Iterator<Item = &Address> {
        self.voters.iter()
    }
}

/// Votes needed to admit a candidate: half the current members, rounded down
pub fn required_votes(registered: usize) -> usize {
    registered / 2
}
