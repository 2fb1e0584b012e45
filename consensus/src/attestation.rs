//! Flight status attestation consensus
//!
//! Reporters register once and receive three watch indexes. A status request
//! is opened under one index; only reporters holding that index may answer.
//! When `min_responses` distinct reporters agree on one status, the request
//! settles through a [`StatusSettlement`] and closes for good.

use flightsurety_core::{
    Address, Amount, AttestationConfig, FlightKey, Hash, Hashable, StatusCode, SuretyError,
    SuretyEvent, SuretyResult, Timestamp,
};
use flightsurety_crypto::hash_multiple;
use flightsurety_state::StagedState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::index::{assign_indexes, IndexSource};
use crate::settlement::StatusSettlement;

const REPORTER_PREFIX: &[u8] = b"reporter:";
const REQUEST_PREFIX: &[u8] = b"request:";

fn reporter_key(reporter: &Address) -> Vec<u8> {
    let mut key = REPORTER_PREFIX.to_vec();
    key.extend_from_slice(reporter.as_bytes());
    key
}

/// Registered reporter and its watch indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterRecord {
    pub indexes: [u8; 3],
    pub registered: bool,
}

impl ReporterRecord {
    pub fn watches(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Identity of one status request: the index plus the flight it asks about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey<'a> {
    pub index: u8,
    pub flight: &'a FlightKey,
}

impl<'a> RequestKey<'a> {
    pub fn new(index: u8, flight: &'a FlightKey) -> Self {
        Self { index, flight }
    }

    pub fn storage_key(&self) -> Vec<u8> {
        let mut key = REQUEST_PREFIX.to_vec();
        key.extend_from_slice(self.hash().as_bytes());
        key
    }
}

impl Hashable for RequestKey<'_> {
    fn hash(&self) -> Hash {
        hash_multiple(&[
            &[self.index],
            self.flight.airline.as_bytes(),
            self.flight.flight.as_bytes(),
            &self.flight.timestamp.as_millis().to_le_bytes(),
        ])
    }
}

/// Pending status request and the reports gathered so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub requester: Address,
    pub open: bool,
    pub opened_at: Timestamp,
    pub responses: BTreeMap<StatusCode, BTreeSet<Address>>,
}

impl AttestationRequest {
    pub fn new(requester: Address, opened_at: Timestamp) -> Self {
        Self {
            requester,
            open: true,
            opened_at,
            responses: BTreeMap::new(),
        }
    }

    /// Distinct reporters backing `status`
    pub fn count(&self, status: StatusCode) -> usize {
        self.responses.get(&status).map_or(0, BTreeSet::len)
    }

    fn expired(&self, expiry_ms: Option<u64>, now: Timestamp) -> bool {
        match expiry_ms {
            Some(ttl) => self.opened_at.as_millis().saturating_add(ttl) < now.as_millis(),
            None => false,
        }
    }
}

/// Result of an accepted report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Counted; `count` reporters now back this status
    Recorded { count: usize },
    /// Same reporter, same status: absorbed without effect
    Duplicate,
    /// This report completed the quorum and the status was settled
    Settled { status: StatusCode },
}

/// Attestation consensus engine
pub struct AttestationEngine {
    config: AttestationConfig,
    indexes: Arc<dyn IndexSource>,
}

impl AttestationEngine {
    pub fn new(config: AttestationConfig, indexes: Arc<dyn IndexSource>) -> Self {
        Self { config, indexes }
    }

    pub fn config(&self) -> &AttestationConfig {
        &self.config
    }

    /// Register a reporter, charging the registration fee
    pub async fn register_reporter(
        &self,
        state: &mut StagedState<'_>,
        reporter: Address,
        fee: Amount,
        now: Timestamp,
    ) -> SuretyResult<[u8; 3]> {
        if self.reporter(state, &reporter).await?.is_some() {
            return Err(SuretyError::AlreadyRegistered);
        }
        if fee < self.config.registration_fee {
            return Err(SuretyError::RegistrationFeeTooLow {
                required: self.config.registration_fee,
                provided: fee,
            });
        }

        let indexes = assign_indexes(
            self.indexes.as_ref(),
            &reporter,
            now,
            self.config.max_index,
        )?;
        state.write(
            reporter_key(&reporter),
            &ReporterRecord {
                indexes,
                registered: true,
            },
        )?;
        state.deposit(fee).await?;
        state.emit(SuretyEvent::ReporterRegistered { reporter, indexes });

        info!("Reporter {} registered with indexes {:?}", reporter, indexes);
        Ok(indexes)
    }

    pub async fn reporter(
        &self,
        state: &StagedState<'_>,
        reporter: &Address,
    ) -> SuretyResult<Option<ReporterRecord>> {
        Ok(state
            .read::<ReporterRecord>(&reporter_key(reporter))
            .await?
            .filter(|r| r.registered))
    }

    /// Watch indexes of a registered reporter
    pub async fn reporter_indexes(
        &self,
        state: &StagedState<'_>,
        reporter: &Address,
    ) -> SuretyResult<[u8; 3]> {
        self.reporter(state, reporter)
            .await?
            .map(|r| r.indexes)
            .ok_or(SuretyError::NotAReporter)
    }

    /// Ask reporters for a flight's status; returns the index they must hold.
    ///
    /// An existing request under the drawn key is left untouched and a closed
    /// one is never reopened.
    pub async fn open_status_request(
        &self,
        state: &mut StagedState<'_>,
        requester: Address,
        flight: &FlightKey,
        now: Timestamp,
    ) -> SuretyResult<u8> {
        let index = self
            .indexes
            .next_index(&requester, now, self.config.max_index)
            % self.config.max_index;
        let key = RequestKey::new(index, flight).storage_key();

        match state.read::<AttestationRequest>(&key).await? {
            Some(existing) if !existing.open => {
                debug!("Request for {} on index {} already settled", flight, index);
                return Ok(index);
            }
            Some(_) => {}
            None => state.write(key, &AttestationRequest::new(requester, now))?,
        }

        state.emit(SuretyEvent::StatusRequested {
            index,
            airline: flight.airline,
            flight: flight.flight.clone(),
            timestamp: flight.timestamp,
            requester,
        });

        info!("Status of {} requested on index {}", flight, index);
        Ok(index)
    }

    pub async fn request(
        &self,
        state: &StagedState<'_>,
        index: u8,
        flight: &FlightKey,
    ) -> SuretyResult<Option<AttestationRequest>> {
        state.read(&RequestKey::new(index, flight).storage_key()).await
    }

    /// Record a reporter's answer, settling the flight once quorum is reached
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_report(
        &self,
        state: &mut StagedState<'_>,
        settlement: &dyn StatusSettlement,
        reporter: Address,
        index: u8,
        flight: &FlightKey,
        status: StatusCode,
        now: Timestamp,
    ) -> SuretyResult<ReportOutcome> {
        let watches = self
            .reporter(state, &reporter)
            .await?
            .map_or(false, |r| r.watches(index));
        if !watches {
            return Err(SuretyError::IndexMismatch(index));
        }

        let key = RequestKey::new(index, flight).storage_key();
        let mut request = state
            .read::<AttestationRequest>(&key)
            .await?
            .filter(|r| r.open)
            .ok_or(SuretyError::RequestNotOpen)?;
        if request.expired(self.config.request_expiry_ms, now) {
            return Err(SuretyError::RequestExpired);
        }

        if !request.responses.entry(status).or_default().insert(reporter) {
            debug!("Duplicate {} report from {} for {}", status, reporter, flight);
            return Ok(ReportOutcome::Duplicate);
        }
        let count = request.count(status);

        state.emit(SuretyEvent::AttestationReported {
            airline: flight.airline,
            flight: flight.flight.clone(),
            timestamp: flight.timestamp,
            status,
            reporter,
        });
        debug!(
            "Report {} for {} from {}: {}/{}",
            status, flight, reporter, count, self.config.min_responses
        );

        if count < self.config.min_responses {
            state.write(key, &request)?;
            return Ok(ReportOutcome::Recorded { count });
        }

        settlement.process_status(state, flight, status).await?;

        request.open = false;
        state.write(key, &request)?;
        state.emit(SuretyEvent::StatusSettled {
            airline: flight.airline,
            flight: flight.flight.clone(),
            timestamp: flight.timestamp,
            status,
        });

        info!("Status of {} settled as {} by {} reporters", flight, status, count);
        Ok(ReportOutcome::Settled { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ScriptedIndexSource;
    use async_trait::async_trait;
    use flightsurety_core::StateMutator;
    use flightsurety_state::MemoryStateStore;
    use parking_lot::Mutex;

    /// Records every settlement it is asked to apply
    #[derive(Default)]
    struct RecordingSettlement {
        calls: Mutex<Vec<(FlightKey, StatusCode)>>,
    }

    #[async_trait]
    impl StatusSettlement for RecordingSettlement {
        async fn process_status(
            &self,
            _state: &mut StagedState<'_>,
            flight: &FlightKey,
            status: StatusCode,
        ) -> SuretyResult<()> {
            if status == StatusCode::Unknown {
                return Err(SuretyError::UnknownStatus);
            }
            self.calls.lock().push((flight.clone(), status));
            Ok(())
        }
    }

    fn reporter(n: u8) -> Address {
        Address([n; 32])
    }

    fn flight() -> FlightKey {
        FlightKey::new(Address([0xAA; 32]), "FS101", Timestamp::from_millis(1_000))
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    async fn commit(store: &MemoryStateStore, staged: StagedState<'_>) {
        let (changes, _) = staged.into_parts();
        store.apply_batch(changes).await.unwrap();
    }

    /// Reporters 1..=5 all watch 0, 1, 2; the single request opens on index 1
    async fn setup(config: AttestationConfig) -> (MemoryStateStore, AttestationEngine) {
        let store = MemoryStateStore::new();
        let script = vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 1];
        let engine = AttestationEngine::new(config, Arc::new(ScriptedIndexSource::new(script)));

        let mut staged = StagedState::new(&store);
        for n in 1..=5 {
            let indexes = engine
                .register_reporter(&mut staged, reporter(n), Amount::from_coins(1), at(0))
                .await
                .unwrap();
            assert_eq!(indexes, [0, 1, 2]);
        }
        let index = engine
            .open_status_request(&mut staged, reporter(9), &flight(), at(10))
            .await
            .unwrap();
        assert_eq!(index, 1);
        commit(&store, staged).await;

        (store, engine)
    }

    #[tokio::test]
    async fn test_registration_rules() {
        let store = MemoryStateStore::new();
        let engine = AttestationEngine::new(
            AttestationConfig::default(),
            Arc::new(ScriptedIndexSource::new(vec![3, 3, 5, 9])),
        );
        let mut staged = StagedState::new(&store);

        let low = engine
            .register_reporter(&mut staged, reporter(1), Amount::new(1), at(0))
            .await;
        assert!(matches!(low, Err(SuretyError::RegistrationFeeTooLow { .. })));

        let indexes = engine
            .register_reporter(&mut staged, reporter(1), Amount::from_coins(1), at(0))
            .await
            .unwrap();
        assert_eq!(indexes, [3, 5, 9]);
        assert_eq!(engine.reporter_indexes(&staged, &reporter(1)).await.unwrap(), indexes);
        // Stable across queries
        assert_eq!(engine.reporter_indexes(&staged, &reporter(1)).await.unwrap(), indexes);

        let again = engine
            .register_reporter(&mut staged, reporter(1), Amount::from_coins(1), at(0))
            .await;
        assert!(matches!(again, Err(SuretyError::AlreadyRegistered)));

        let unknown = engine.reporter_indexes(&staged, &reporter(2)).await;
        assert!(matches!(unknown, Err(SuretyError::NotAReporter)));

        assert_eq!(staged.treasury().await.unwrap(), Amount::from_coins(1));
    }

    #[tokio::test]
    async fn test_quorum_settles_once() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        for (n, expected) in [(1, 1), (2, 2)] {
            let outcome = engine
                .submit_report(&mut staged, &settlement, reporter(n), 1, &flight(), StatusCode::LateAirline, at(20))
                .await
                .unwrap();
            assert_eq!(outcome, ReportOutcome::Recorded { count: expected });
        }

        let outcome = engine
            .submit_report(&mut staged, &settlement, reporter(3), 1, &flight(), StatusCode::LateAirline, at(20))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::Settled {
                status: StatusCode::LateAirline
            }
        );
        assert_eq!(settlement.calls.lock().len(), 1);

        let request = engine.request(&staged, 1, &flight()).await.unwrap().unwrap();
        assert!(!request.open);

        // Fourth report after settlement has no effect
        let late = engine
            .submit_report(&mut staged, &settlement, reporter(4), 1, &flight(), StatusCode::LateAirline, at(20))
            .await;
        assert!(matches!(late, Err(SuretyError::RequestNotOpen)));
        assert_eq!(settlement.calls.lock().len(), 1);

        let settled = staged
            .events()
            .iter()
            .filter(|e| matches!(e, SuretyEvent::StatusSettled { .. }))
            .count();
        assert_eq!(settled, 1);
    }

    #[tokio::test]
    async fn test_index_mismatch_even_when_open() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        let wrong = engine
            .submit_report(&mut staged, &settlement, reporter(1), 7, &flight(), StatusCode::OnTime, at(20))
            .await;
        assert!(matches!(wrong, Err(SuretyError::IndexMismatch(7))));

        let stranger = engine
            .submit_report(&mut staged, &settlement, reporter(42), 1, &flight(), StatusCode::OnTime, at(20))
            .await;
        assert!(matches!(stranger, Err(SuretyError::IndexMismatch(1))));

        // Assigned index, but no request was opened on it
        let unopened = engine
            .submit_report(&mut staged, &settlement, reporter(1), 0, &flight(), StatusCode::OnTime, at(20))
            .await;
        assert!(matches!(unopened, Err(SuretyError::RequestNotOpen)));
    }

    #[tokio::test]
    async fn test_duplicate_report_absorbed() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        for _ in 0..3 {
            engine
                .submit_report(&mut staged, &settlement, reporter(1), 1, &flight(), StatusCode::LateWeather, at(20))
                .await
                .unwrap();
        }
        let request = engine.request(&staged, 1, &flight()).await.unwrap().unwrap();
        assert_eq!(request.count(StatusCode::LateWeather), 1);
        assert!(request.open);
        assert!(settlement.calls.lock().is_empty());

        let reported = staged
            .events()
            .iter()
            .filter(|e| matches!(e, SuretyEvent::AttestationReported { .. }))
            .count();
        assert_eq!(reported, 1);
    }

    #[tokio::test]
    async fn test_split_reports_never_settle() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        let statuses = [
            StatusCode::OnTime,
            StatusCode::LateWeather,
            StatusCode::OnTime,
            StatusCode::LateWeather,
            StatusCode::LateOther,
        ];
        for (n, status) in (1..=5).zip(statuses) {
            let outcome = engine
                .submit_report(&mut staged, &settlement, reporter(n), 1, &flight(), status, at(20))
                .await
                .unwrap();
            assert!(matches!(outcome, ReportOutcome::Recorded { .. }));
        }

        let request = engine.request(&staged, 1, &flight()).await.unwrap().unwrap();
        assert!(request.open);
        assert_eq!(request.count(StatusCode::OnTime), 2);
        assert_eq!(request.count(StatusCode::LateWeather), 2);
        assert!(settlement.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_settlement_fails_report() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();

        let mut staged = StagedState::new(&store);
        for n in 1..=2 {
            engine
                .submit_report(&mut staged, &settlement, reporter(n), 1, &flight(), StatusCode::Unknown, at(20))
                .await
                .unwrap();
        }
        commit(&store, staged).await;

        let mut staged = StagedState::new(&store);
        let third = engine
            .submit_report(&mut staged, &settlement, reporter(3), 1, &flight(), StatusCode::Unknown, at(20))
            .await;
        assert!(matches!(third, Err(SuretyError::UnknownStatus)));
        drop(staged);

        let view = StagedState::new(&store);
        let request = engine.request(&view, 1, &flight()).await.unwrap().unwrap();
        assert!(request.open);
        assert_eq!(request.count(StatusCode::Unknown), 2);
    }

    #[tokio::test]
    async fn test_expiry_when_configured() {
        let config = AttestationConfig {
            request_expiry_ms: Some(100),
            ..AttestationConfig::default()
        };
        let (store, engine) = setup(config).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        // Opened at 10: still live at 110, expired after
        engine
            .submit_report(&mut staged, &settlement, reporter(1), 1, &flight(), StatusCode::OnTime, at(110))
            .await
            .unwrap();
        let expired = engine
            .submit_report(&mut staged, &settlement, reporter(2), 1, &flight(), StatusCode::OnTime, at(111))
            .await;
        assert!(matches!(expired, Err(SuretyError::RequestExpired)));
    }

    #[tokio::test]
    async fn test_closed_request_not_reopened() {
        let (store, engine) = setup(AttestationConfig::default()).await;
        let settlement = RecordingSettlement::default();
        let mut staged = StagedState::new(&store);

        for n in 1..=3 {
            engine
                .submit_report(&mut staged, &settlement, reporter(n), 1, &flight(), StatusCode::OnTime, at(20))
                .await
                .unwrap();
        }

        // A fresh request drawing the same index finds the closed one
        let rerun = AttestationEngine::new(
            AttestationConfig::default(),
            Arc::new(ScriptedIndexSource::new(vec![1])),
        );
        let index = rerun
            .open_status_request(&mut staged, reporter(9), &flight(), at(30))
            .await
            .unwrap();
        assert_eq!(index, 1);
        let request = engine.request(&staged, 1, &flight()).await.unwrap().unwrap();
        assert!(!request.open);
    }
}
