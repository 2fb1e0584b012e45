//! Hook through which a settled attestation reaches the ledger

use async_trait::async_trait;
use flightsurety_core::{FlightKey, StatusCode, SuretyResult};
use flightsurety_state::StagedState;

/// Applies an agreed flight status inside the reporting operation's stage.
///
/// An error aborts the whole report that reached quorum.
#[async_trait]
pub trait StatusSettlement: Send + Sync {
    async fn process_status(
        &self,
        state: &mut StagedState<'_>,
        flight: &FlightKey,
        status: StatusCode,
    ) -> SuretyResult<()>;
}
