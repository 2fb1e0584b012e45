//! Node runtime combining all components
//!
//! Every mutating call takes the writer lock, stages its writes, runs the
//! engine and commits the write-set as one batch. Events are published only
//! after the batch lands; a failed call commits nothing and publishes nothing.

use flightsurety_consensus::{
    Admission, AttestationEngine, AttestationRequest, BallotBox, BootstrapAuthority,
    IndexSource, MembershipEngine, OsRngIndexSource, Proposer, ReportOutcome, StatusSettlement,
    WeakIndexSource,
};
use flightsurety_core::{
    Address, Amount, CallContext, FlightKey, NodeConfig, StateMutator, StateProvider,
    StateRoot, StateVersion, StatusCode, SuretyError, SuretyEvent, SuretyResult, Timestamp,
};
use flightsurety_insurance::{
    FlightRegistry, FlightSettlement, GenesisConfig, GenesisInitializer, InsuranceLedger, Payout,
    WalletBook,
};
use flightsurety_state::{AirlineRecord, FlightRecord, LedgerStore, StagedState, StateStore};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Node runtime managing all components
pub struct NodeRuntime {
    config: NodeConfig,
    store: Arc<LedgerStore>,
    membership: MembershipEngine,
    attestation: AttestationEngine,
    registry: FlightRegistry,
    ledger: Arc<InsuranceLedger>,
    settlement: FlightSettlement,
    payout: Arc<dyn Payout>,
    operator: Option<Address>,
    writer: Mutex<()>,
    events: broadcast::Sender<SuretyEvent>,
}

impl NodeRuntime {
    /// Create a runtime over `store` with the configured index source and an
    /// in-process wallet book as payout rail
    pub fn new(config: NodeConfig, store: Arc<LedgerStore>) -> SuretyResult<Self> {
        let indexes: Arc<dyn IndexSource> = if config.surety.attestation.strong_indexes {
            Arc::new(OsRngIndexSource)
        } else {
            Arc::new(WeakIndexSource::new(config.surety.attestation.nonce_wrap))
        };
        Self::with_parts(config, store, indexes, Arc::new(WalletBook::new()))
    }

    pub fn with_parts(
        config: NodeConfig,
        store: Arc<LedgerStore>,
        indexes: Arc<dyn IndexSource>,
        payout: Arc<dyn Payout>,
    ) -> SuretyResult<Self> {
        config.validate()?;

        let operator = config
            .operator
            .as_deref()
            .map(|hex| {
                Address::from_hex(hex).map_err(|e| SuretyError::InvalidAddress(e.to_string()))
            })
            .transpose()?;

        let ledger = Arc::new(InsuranceLedger::new(config.surety.insurance.clone()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            membership: MembershipEngine::new(config.surety.membership.clone()),
            attestation: AttestationEngine::new(config.surety.attestation.clone(), indexes),
            registry: FlightRegistry::new(),
            settlement: FlightSettlement::new(ledger.clone()),
            ledger,
            payout,
            operator,
            store,
            config,
            writer: Mutex::new(()),
            events,
        })
    }

    /// Call context for `caller`, privileged when it is the configured operator
    pub fn context(&self, caller: Address) -> CallContext {
        if self.operator == Some(caller) {
            CallContext::operator(caller)
        } else {
            CallContext::new(caller)
        }
    }

    /// Receive events of committed operations
    pub fn subscribe(&self) -> broadcast::Receiver<SuretyEvent> {
        self.events.subscribe()
    }

    /// Stage over the committed store, refusing work while paused
    async fn stage(&self) -> SuretyResult<StagedState<'_>> {
        let staged = StagedState::new(self.store.provider());
        if !staged.is_operational().await? {
            return Err(SuretyError::NotOperational);
        }
        Ok(staged)
    }

    /// Commit a stage as one batch, then publish its events
    async fn commit(&self, staged: StagedState<'_>) -> SuretyResult<StateVersion> {
        let (changes, events) = staged.into_parts();
        let version = if changes.is_empty() {
            self.store.version().await
        } else {
            self.store.apply_batch(changes).await?
        };

        for event in events {
            debug!("Publishing {}", event.name());
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        Ok(version)
    }

    /// Apply a genesis configuration to an empty ledger
    pub async fn initialize_genesis(&self, genesis: GenesisConfig) -> SuretyResult<Address> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;

        let deployer = self.operator.unwrap_or(Address::ZERO);
        let airline = GenesisInitializer::new(genesis)
            .initialize(
                &mut staged,
                &self.membership,
                &self.registry,
                BootstrapAuthority::new(deployer),
            )
            .await?;
        self.commit(staged).await?;

        info!("Genesis initialized, state root: {}", self.state_root().await?);
        Ok(airline)
    }

    // ============ Membership ============

    /// Propose (and vote for) an airline; the operator may bootstrap an empty registry
    pub async fn propose_airline(
        &self,
        ctx: CallContext,
        candidate: Address,
        name: &str,
    ) -> SuretyResult<Admission> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;

        let proposer = if ctx.privileged && staged.airline_count().await? == 0 {
            Proposer::Bootstrap(BootstrapAuthority::new(ctx.caller))
        } else {
            Proposer::Airline(ctx.caller)
        };
        let admission = self
            .membership
            .propose_airline(&mut staged, candidate, name, proposer)
            .await?;

        self.commit(staged).await?;
        Ok(admission)
    }

    /// Fund the calling airline
    pub async fn fund_airline(&self, ctx: CallContext, amount: Amount) -> SuretyResult<()> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        self.membership
            .fund_airline(&mut staged, ctx.caller, amount)
            .await?;
        self.commit(staged).await?;
        Ok(())
    }

    // ============ Flights and insurance ============

    /// Register a flight owned by the calling airline
    pub async fn register_flight(
        &self,
        ctx: CallContext,
        flight: &str,
        timestamp: Timestamp,
    ) -> SuretyResult<FlightRecord> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        let record = self
            .registry
            .register_flight(&mut staged, ctx.caller, flight, timestamp)
            .await?;
        self.commit(staged).await?;
        Ok(record)
    }

    pub async fn buy_insurance(
        &self,
        ctx: CallContext,
        airline: Address,
        flight: &str,
        premium: Amount,
    ) -> SuretyResult<()> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        self.ledger
            .buy_insurance(&mut staged, ctx.caller, airline, flight, premium)
            .await?;
        self.commit(staged).await?;
        Ok(())
    }

    pub async fn withdraw(&self, ctx: CallContext, amount: Amount) -> SuretyResult<()> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        self.ledger
            .withdraw(&mut staged, self.payout.as_ref(), ctx.caller, amount)
            .await?;
        self.commit(staged).await?;
        Ok(())
    }

    // ============ Attestation ============

    pub async fn register_reporter(&self, ctx: CallContext, fee: Amount) -> SuretyResult<[u8; 3]> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        let indexes = self
            .attestation
            .register_reporter(&mut staged, ctx.caller, fee, ctx.now)
            .await?;
        self.commit(staged).await?;
        Ok(indexes)
    }

    /// Open a status request; returns the index reporters must hold
    pub async fn request_status(&self, ctx: CallContext, flight: &FlightKey) -> SuretyResult<u8> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        let index = self
            .attestation
            .open_status_request(&mut staged, ctx.caller, flight, ctx.now)
            .await?;
        self.commit(staged).await?;
        Ok(index)
    }

    pub async fn submit_report(
        &self,
        ctx: CallContext,
        index: u8,
        flight: &FlightKey,
        status: StatusCode,
    ) -> SuretyResult<ReportOutcome> {
        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        let outcome = self
            .attestation
            .submit_report(
                &mut staged,
                &self.settlement,
                ctx.caller,
                index,
                flight,
                status,
                ctx.now,
            )
            .await?;
        self.commit(staged).await?;
        Ok(outcome)
    }

    // ============ Operator ============

    /// Settle a flight status directly, bypassing reporter quorum
    pub async fn settle_status(
        &self,
        ctx: CallContext,
        flight: &FlightKey,
        status: StatusCode,
    ) -> SuretyResult<()> {
        if !ctx.privileged {
            return Err(SuretyError::NotPrivileged);
        }

        let _guard = self.writer.lock().await;
        let mut staged = self.stage().await?;
        self.settlement
            .process_status(&mut staged, flight, status)
            .await?;
        staged.emit(SuretyEvent::StatusSettled {
            airline: flight.airline,
            flight: flight.flight.clone(),
            timestamp: flight.timestamp,
            status,
        });
        self.commit(staged).await?;

        info!("Operator {} settled {} as {}", ctx.caller, flight, status);
        Ok(())
    }

    /// Pause or resume all mutating operations
    pub async fn set_operational(&self, ctx: CallContext, operational: bool) -> SuretyResult<()> {
        if !ctx.privileged {
            return Err(SuretyError::NotPrivileged);
        }

        let _guard = self.writer.lock().await;
        let mut staged = StagedState::new(self.store.provider());
        if staged.is_operational().await? == operational {
            return Ok(());
        }
        staged.set_operational(operational)?;
        staged.emit(SuretyEvent::OperationalChanged { operational });
        self.commit(staged).await?;

        info!("Operational set to {} by {}", operational, ctx.caller);
        Ok(())
    }

    // ============ Reads ============

    fn view(&self) -> StagedState<'_> {
        StagedState::new(self.store.provider())
    }

    pub async fn is_operational(&self) -> SuretyResult<bool> {
        self.view().is_operational().await
    }

    pub async fn airline(&self, airline: &Address) -> SuretyResult<Option<AirlineRecord>> {
        self.view().airline(airline).await
    }

    pub async fn airline_count(&self) -> SuretyResult<usize> {
        self.view().airline_count().await
    }

    pub async fn ballot(&self, candidate: &Address) -> SuretyResult<BallotBox> {
        self.membership.ballot(&self.view(), candidate).await
    }

    pub async fn flight(&self, flight: &str) -> SuretyResult<Option<FlightRecord>> {
        self.registry.flight(&self.view(), flight).await
    }

    pub async fn premium(&self, passenger: &Address, flight: &str) -> SuretyResult<Amount> {
        self.ledger.premium(&self.view(), passenger, flight).await
    }

    pub async fn credit(&self, passenger: &Address) -> SuretyResult<Amount> {
        self.ledger.credit(&self.view(), passenger).await
    }

    pub async fn treasury(&self) -> SuretyResult<Amount> {
        self.view().treasury().await
    }

    pub async fn reporter_indexes(&self, reporter: &Address) -> SuretyResult<[u8; 3]> {
        self.attestation.reporter_indexes(&self.view(), reporter).await
    }

    pub async fn status_request(
        &self,
        index: u8,
        flight: &FlightKey,
    ) -> SuretyResult<Option<AttestationRequest>> {
        self.attestation.request(&self.view(), index, flight).await
    }

    pub async fn state_version(&self) -> StateVersion {
        self.store.version().await
    }

    pub async fn state_root(&self) -> SuretyResult<StateRoot> {
        self.store.compute_root().await
    }

    pub fn operator(&self) -> Option<Address> {
        self.operator
    }

    /// Get config reference
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
