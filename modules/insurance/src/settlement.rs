//! Applies agreed flight statuses to the ledger

use async_trait::async_trait;
use flightsurety_consensus::StatusSettlement;
use flightsurety_core::{FlightKey, StatusCode, SuretyError, SuretyResult};
use flightsurety_state::StagedState;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::InsuranceLedger;

/// Settlement path from attestation quorum (or an operator) into the ledger
pub struct FlightSettlement {
    ledger: Arc<InsuranceLedger>,
}

impl FlightSettlement {
    pub fn new(ledger: Arc<InsuranceLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl StatusSettlement for FlightSettlement {
    /// Record `status` on the flight; the first `LateAirline` credits its insurees
    /// and freezes the flight, so later statuses are accepted but not applied
    async fn process_status(
        &self,
        state: &mut StagedState<'_>,
        flight: &FlightKey,
        status: StatusCode,
    ) -> SuretyResult<()> {
        if status == StatusCode::Unknown {
            return Err(SuretyError::UnknownStatus);
        }

        let mut record = state
            .flight(&flight.flight)
            .await?
            .filter(|f| f.airline == flight.airline)
            .ok_or_else(|| SuretyError::OwnerMismatch(flight.flight.clone()))?;

        let previous = record.status;
        if previous.is_airline_fault() {
            debug!("Flight {} already credited, ignoring status {}", flight, status);
            return Ok(());
        }
        record.status = status;
        record.updated_at = flight.timestamp;
        state.put_flight(&record)?;

        info!("Flight {} status {} -> {}", flight, previous, status);

        if status.is_airline_fault() {
            self.ledger.credit_sweep(state, &flight.flight).await?;
        }
        Ok(())
    }
}
