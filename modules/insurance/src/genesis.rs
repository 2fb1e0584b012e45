//! Genesis configuration for a FlightSurety ledger

use flightsurety_consensus::{BootstrapAuthority, MembershipEngine, Proposer};
use flightsurety_core::{Address, Amount, Hash, SuretyError, SuretyResult, Timestamp};
use flightsurety_state::StagedState;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::registry::FlightRegistry;

/// First airline, admitted with the bootstrap authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAirline {
    pub address: String,
    pub name: String,
    /// Funding in base units; required before seed flights can be registered
    #[serde(default)]
    pub fund: Option<String>,
}

/// Flight registered by the genesis airline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisFlight {
    pub name: String,
    pub timestamp: u64,
}

/// Genesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Network name
    pub network: String,
    pub airline: GenesisAirline,
    #[serde(default)]
    pub flights: Vec<GenesisFlight>,
}

impl GenesisConfig {
    pub fn new(network: &str, airline: &Address, name: &str) -> Self {
        Self {
            network: network.to_string(),
            airline: GenesisAirline {
                address: airline.to_hex(),
                name: name.to_string(),
                fund: None,
            },
            flights: vec![],
        }
    }

    /// Development genesis: airline funded with `fund_coins`
    pub fn devnet(airline: &Address, fund_coins: u64) -> Self {
        Self::new("FlightSurety Devnet", airline, "Genesis Air").with_fund(fund_coins)
    }

    pub fn with_fund(mut self, coins: u64) -> Self {
        self.airline.fund = Some(format!("{}", Amount::from_coins(coins).0));
        self
    }

    pub fn add_flight(mut self, name: &str, timestamp: u64) -> Self {
        self.flights.push(GenesisFlight {
            name: name.to_string(),
            timestamp,
        });
        self
    }

    pub fn airline_address(&self) -> SuretyResult<Address> {
        Address::from_hex(&self.airline.address)
            .map_err(|e| SuretyError::InvalidAddress(e.to_string()))
    }

    pub fn fund(&self) -> SuretyResult<Option<Amount>> {
        self.airline
            .fund
            .as_deref()
            .map(|raw| {
                raw.parse::<u128>().map(Amount::new).map_err(|e| {
                    SuretyError::ConfigError(format!("Invalid genesis fund: {}", e))
                })
            })
            .transpose()
    }

    pub fn to_json(&self) -> SuretyResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SuretyError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> SuretyResult<Self> {
        serde_json::from_str(json).map_err(|e| SuretyError::DeserializationError(e.to_string()))
    }
}

/// Applies a genesis configuration to an empty ledger
pub struct GenesisInitializer {
    config: GenesisConfig,
}

impl GenesisInitializer {
    pub fn new(config: GenesisConfig) -> Self {
        Self { config }
    }

    /// Admit, fund and seed the genesis airline; returns its address
    pub async fn initialize(
        &self,
        state: &mut StagedState<'_>,
        membership: &MembershipEngine,
        registry: &FlightRegistry,
        authority: BootstrapAuthority,
    ) -> SuretyResult<Address> {
        info!("Initializing genesis for network: {}", self.config.network);

        let airline = self.config.airline_address()?;
        membership
            .propose_airline(
                state,
                airline,
                &self.config.airline.name,
                Proposer::Bootstrap(authority),
            )
            .await?;

        if let Some(fund) = self.config.fund()? {
            membership.fund_airline(state, airline, fund).await?;
        }

        for flight in &self.config.flights {
            registry
                .register_flight(
                    state,
                    airline,
                    &flight.name,
                    Timestamp::from_millis(flight.timestamp),
                )
                .await?;
            info!("Genesis flight: {}", flight.name);
        }

        Ok(airline)
    }
}

/// Hash identifying a genesis configuration
pub fn compute_genesis_hash(config: &GenesisConfig) -> SuretyResult<Hash> {
    let json = config.to_json()?;
    Ok(flightsurety_crypto::hash(json.as_bytes()))
}
