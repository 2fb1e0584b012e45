//! Observable events emitted by committed operations

use crate::types::{Address, Amount, StatusCode, Timestamp};
use serde::{Deserialize, Serialize};

/// Events published after an operation commits. Observers never feed them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SuretyEvent {
    MembershipVoteCast {
        candidate: Address,
        voter: Address,
        count: usize,
    },
    AirlineAdmitted {
        airline: Address,
        name: String,
        votes: usize,
    },
    AirlineFunded {
        airline: Address,
        amount: Amount,
    },
    FlightRegistered {
        airline: Address,
        flight: String,
        timestamp: Timestamp,
    },
    InsurancePurchased {
        passenger: Address,
        flight: String,
        premium: Amount,
    },
    ReporterRegistered {
        reporter: Address,
        indexes: [u8; 3],
    },
    StatusRequested {
        index: u8,
        airline: Address,
        flight: String,
        timestamp: Timestamp,
        requester: Address,
    },
    AttestationReported {
        airline: Address,
        flight: String,
        timestamp: Timestamp,
        status: StatusCode,
        reporter: Address,
    },
    StatusSettled {
        airline: Address,
        flight: String,
        timestamp: Timestamp,
        status: StatusCode,
    },
    PassengerCredited {
        passenger: Address,
        flight: String,
        amount: Amount,
    },
    CreditWithdrawn {
        passenger: Address,
        amount: Amount,
    },
    OperationalChanged {
        operational: bool,
    },
}

impl SuretyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SuretyEvent::MembershipVoteCast { .. } => "membership_vote_cast",
            SuretyEvent::AirlineAdmitted { .. } => "airline_admitted",
            SuretyEvent::AirlineFunded { .. } => "airline_funded",
            SuretyEvent::FlightRegistered { .. } => "flight_registered",
            SuretyEvent::InsurancePurchased { .. } => "insurance_purchased",
            SuretyEvent::ReporterRegistered { .. } => "reporter_registered",
            SuretyEvent::StatusRequested { .. } => "status_requested",
            SuretyEvent::AttestationReported { .. } => "attestation_reported",
            SuretyEvent::StatusSettled { .. } => "status_settled",
            SuretyEvent::PassengerCredited { .. } => "passenger_credited",
            SuretyEvent::CreditWithdrawn { .. } => "credit_withdrawn",
            SuretyEvent::OperationalChanged { .. } => "operational_changed",
        }
    }
}
