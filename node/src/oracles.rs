//! Simulated oracle fleet
//!
//! Registers a set of reporters and answers every status request whose
//! index one of them watches.

use flightsurety_consensus::ReportOutcome;
use flightsurety_core::{
    Address, FlightKey, StatusCode, StatusPolicy, SuretyError, SuretyEvent, SuretyResult,
};
use flightsurety_crypto::KeyPair;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::runtime::NodeRuntime;

/// Statuses a random oracle chooses from
const REPORTABLE: [StatusCode; 5] = [
    StatusCode::OnTime,
    StatusCode::LateAirline,
    StatusCode::LateWeather,
    StatusCode::LateTechnical,
    StatusCode::LateOther,
];

struct SimulatedOracle {
    address: Address,
    indexes: [u8; 3],
}

/// Fleet of simulated reporters sharing one runtime
pub struct OracleFleet {
    runtime: Arc<NodeRuntime>,
    oracles: Vec<SimulatedOracle>,
    policy: StatusPolicy,
}

impl OracleFleet {
    /// Register `count` fresh reporters, each paying the registration fee
    pub async fn register(
        runtime: Arc<NodeRuntime>,
        count: usize,
        policy: StatusPolicy,
    ) -> SuretyResult<Self> {
        let fee = runtime.config().surety.attestation.registration_fee;
        let mut oracles = Vec::with_capacity(count);

        for _ in 0..count {
            let address = KeyPair::generate().address();
            let indexes = runtime
                .register_reporter(runtime.context(address), fee)
                .await?;
            debug!("Oracle {} watching {:?}", address, indexes);
            oracles.push(SimulatedOracle { address, indexes });
        }

        info!("Registered {} simulated oracles", oracles.len());
        Ok(Self {
            runtime,
            oracles,
            policy,
        })
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    fn pick_status(&self) -> StatusCode {
        match self.policy {
            StatusPolicy::Fixed(code) => StatusCode::from_code(code).unwrap_or_default(),
            StatusPolicy::Random => REPORTABLE
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Have every oracle watching `index` report on `flight`
    pub async fn respond(&self, index: u8, flight: &FlightKey) {
        for oracle in self.oracles.iter().filter(|o| o.indexes.contains(&index)) {
            let status = self.pick_status();
            let ctx = self.runtime.context(oracle.address);

            match self.runtime.submit_report(ctx, index, flight, status).await {
                Ok(ReportOutcome::Settled { status }) => {
                    info!("Oracle {} completed quorum: {} is {}", oracle.address, flight, status);
                }
                Ok(outcome) => {
                    debug!("Oracle {} reported {}: {:?}", oracle.address, status, outcome);
                }
                Err(SuretyError::RequestNotOpen) => {
                    debug!("Request for {} already closed", flight);
                }
                Err(e) => {
                    warn!("Oracle {} report rejected: {}", oracle.address, e);
                }
            }
        }
    }

    /// Answer status requests on a background task; the node aborts the
    /// returned handle on shutdown
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.runtime.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SuretyEvent::StatusRequested {
                        index,
                        airline,
                        flight,
                        timestamp,
                        ..
                    }) => {
                        let key = FlightKey::new(airline, flight, timestamp);
                        self.respond(index, &key).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Oracle fleet lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
