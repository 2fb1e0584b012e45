//! Configuration types for FlightSurety

use crate::error::SuretyError;
use crate::traits::SuretyResult;
use crate::types::{Amount, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Ledger store backend
    pub storage: StorageBackend,

    /// API configuration
    pub api: ApiConfig,

    /// Simulated oracle fleet
    pub oracles: OracleConfig,

    /// Membership, insurance and attestation parameters
    pub surety: SuretyConfig,

    /// Hex address treated as the privileged operator
    pub operator: Option<String>,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "flightsurety-node".to_string(),
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::Memory,
            api: ApiConfig::default(),
            oracles: OracleConfig::default(),
            surety: SuretyConfig::default(),
            operator: None,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> SuretyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SuretyError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> SuretyResult<Self> {
        let config: NodeConfig = serde_json::from_str(json)
            .map_err(|e| SuretyError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SuretyResult<()> {
        self.oracles.validate()?;
        self.surety.validate()
    }

    pub fn to_json(&self) -> SuretyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Where the ledger lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP API
    pub enabled: bool,

    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:8080".to_string(),
            enable_cors: true,
        }
    }
}

/// How simulated oracles pick the status they report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "code")]
pub enum StatusPolicy {
    Random,
    Fixed(u8),
}

/// Simulated oracle fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub count: usize,
    pub policy: StatusPolicy,
}

impl OracleConfig {
    /// A fixed policy must name a settleable status
    pub fn validate(&self) -> SuretyResult<()> {
        if let StatusPolicy::Fixed(code) = self.policy {
            match StatusCode::from_code(code) {
                Some(StatusCode::Unknown) | None => {
                    return Err(SuretyError::ConfigError(format!(
                        "oracles.policy fixed code {} is not a reportable status",
                        code
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 20,
            policy: StatusPolicy::Random,
        }
    }
}

/// All protocol parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    pub membership: MembershipConfig,
    pub insurance: InsuranceConfig,
    pub attestation: AttestationConfig,
}

impl SuretyConfig {
    pub fn validate(&self) -> SuretyResult<()> {
        let att = &self.attestation;
        if att.max_index < 3 {
            return Err(SuretyError::ConfigError(
                "attestation.max_index must allow three distinct indexes".into(),
            ));
        }
        if att.min_responses == 0 {
            return Err(SuretyError::ConfigError(
                "attestation.min_responses must be at least 1".into(),
            ));
        }
        if att.nonce_wrap == 0 {
            return Err(SuretyError::ConfigError(
                "attestation.nonce_wrap must be positive".into(),
            ));
        }
        if self.membership.multiparty_threshold == 0 {
            return Err(SuretyError::ConfigError(
                "membership.multiparty_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Membership consensus parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    /// Registered airline count from which admission needs votes
    pub multiparty_threshold: usize,

    /// Minimum funding an airline must supply before it can act
    pub minimum_fund: Amount,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            multiparty_threshold: 4,
            minimum_fund: Amount::from_coins(10),
        }
    }
}

/// Insurance parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceConfig {
    /// Maximum premium per passenger and flight
    pub premium_cap: Amount,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            premium_cap: Amount::from_coins(1),
        }
    }
}

/// Attestation consensus parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// Fee a reporter pays to register
    pub registration_fee: Amount,

    /// Agreeing reporters needed to settle a status
    pub min_responses: usize,

    /// Indexes are drawn from [0, max_index)
    pub max_index: u8,

    /// The weak index source's nonce wraps at this value
    pub nonce_wrap: u8,

    /// Requests older than this stop accepting reports; None keeps them open forever
    pub request_expiry_ms: Option<u64>,

    /// Draw indexes from the OS RNG instead of the weak hash source
    pub strong_indexes: bool,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            registration_fee: Amount::from_coins(1),
            min_responses: 3,
            max_index: 10,
            nonce_wrap: 250,
            request_expiry_ms: None,
            strong_indexes: false,
        }
    }
}
