//! Full node implementation

use crate::api::start_api_server;
use crate::oracles::OracleFleet;
use crate::runtime::NodeRuntime;
use flightsurety_core::{NodeConfig, SuretyResult};
use flightsurety_insurance::{compute_genesis_hash, GenesisConfig};
use flightsurety_state::LedgerStore;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Full FlightSurety node
pub struct FlightSuretyNode {
    runtime: Arc<NodeRuntime>,
    genesis: Option<GenesisConfig>,
}

impl FlightSuretyNode {
    /// Create a new node over the configured store
    pub fn new(config: NodeConfig, genesis: Option<GenesisConfig>) -> SuretyResult<Self> {
        let store = Arc::new(LedgerStore::open(config.storage, &config.data_dir)?);
        let runtime = Arc::new(NodeRuntime::new(config, store)?);
        Ok(Self { runtime, genesis })
    }

    /// Start the node
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting FlightSurety node {}...", self.runtime.config().name);

        // Genesis applies only to an empty ledger
        if let Some(genesis) = &self.genesis {
            if self.runtime.airline_count().await? == 0 {
                info!("Genesis hash: {}", compute_genesis_hash(genesis)?);
                let airline = self.runtime.initialize_genesis(genesis.clone()).await?;
                info!("Genesis airline: {}", airline);
            } else {
                info!("Ledger already initialized, skipping genesis");
            }
        }

        let oracle_config = self.runtime.config().oracles.clone();
        let fleet_handle = if oracle_config.enabled && oracle_config.count > 0 {
            let fleet = OracleFleet::register(
                self.runtime.clone(),
                oracle_config.count,
                oracle_config.policy,
            )
            .await?;
            Some(fleet.spawn())
        } else {
            None
        };

        let api_handle = if self.runtime.config().api.enabled {
            let api_runtime = self.runtime.clone();
            let api_addr = self.runtime.config().api.listen_addr.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = start_api_server(api_runtime, &api_addr).await {
                    error!("API server error: {}", e);
                }
            }))
        } else {
            None
        };

        info!("Node started successfully");
        info!(
            "Operator: {}",
            self.runtime
                .operator()
                .map(|a| a.to_hex())
                .unwrap_or_else(|| "none".to_string())
        );
        info!("State version: {}", self.runtime.state_version().await);

        // Wait for shutdown signal
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping node...");
            }
            Err(e) => {
                error!("Error waiting for shutdown signal: {}", e);
            }
        }

        // Cleanup
        for handle in [fleet_handle, api_handle].into_iter().flatten() {
            handle.abort();
        }

        info!("Node stopped");

        Ok(())
    }

    /// Get runtime reference
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }
}

/// Node builder for easier configuration
pub struct NodeBuilder {
    config: NodeConfig,
    genesis: Option<GenesisConfig>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            genesis: None,
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn genesis(mut self, genesis: GenesisConfig) -> Self {
        self.genesis = Some(genesis);
        self
    }

    pub fn operator(mut self, operator: &str) -> Self {
        self.config.operator = Some(operator.to_string());
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn oracles(mut self, count: usize) -> Self {
        self.config.oracles.count = count;
        self
    }

    pub fn build(self) -> SuretyResult<FlightSuretyNode> {
        FlightSuretyNode::new(self.config, self.genesis)
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
