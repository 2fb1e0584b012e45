//! Flight registry

use flightsurety_core::{Address, SuretyError, SuretyEvent, SuretyResult, Timestamp};
use flightsurety_state::{FlightRecord, StagedState};
use tracing::info;

/// Registers flights on behalf of funded airlines
#[derive(Debug, Default, Clone, Copy)]
pub struct FlightRegistry;

impl FlightRegistry {
    pub fn new() -> Self {
        Self
    }

    pub async fn register_flight(
        &self,
        state: &mut StagedState<'_>,
        airline: Address,
        flight: &str,
        timestamp: Timestamp,
    ) -> SuretyResult<FlightRecord> {
        let owner = state
            .airline(&airline)
            .await?
            .filter(|a| a.registered)
            .ok_or(SuretyError::NotAnAirline)?;
        if !owner.funded {
            return Err(SuretyError::AirlineNotFunded);
        }
        if state.flight(flight).await?.is_some() {
            return Err(SuretyError::AlreadyRegistered);
        }

        let record = FlightRecord::new(flight, airline, timestamp);
        state.put_flight(&record)?;
        state.emit(SuretyEvent::FlightRegistered {
            airline,
            flight: flight.to_string(),
            timestamp,
        });

        info!("Flight {} registered by {} ({})", flight, owner.name, airline);
        Ok(record)
    }

    pub async fn flight(
        &self,
        state: &StagedState<'_>,
        flight: &str,
    ) -> SuretyResult<Option<FlightRecord>> {
        state.flight(flight).await
    }
}
