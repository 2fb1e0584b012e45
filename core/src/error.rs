//! Error types for FlightSurety

use crate::types::Amount;
use thiserror::Error;

/// Main error type for FlightSurety
#[derive(Error, Debug)]
pub enum SuretyError {
    // ============ Authorization Errors ============
    #[error("Proposer is not a funded airline")]
    ProposerNotFunded,

    #[error("Caller is not a registered airline")]
    NotAnAirline,

    #[error("Airline has not supplied its minimum funding")]
    AirlineNotFunded,

    #[error("Airlines cannot withdraw passenger credit")]
    AirlinesCannotWithdraw,

    #[error("Operation requires a privileged operator")]
    NotPrivileged,

    #[error("Caller is not a registered reporter")]
    NotAReporter,

    // ============ State Conflict Errors ============
    #[error("Already registered")]
    AlreadyRegistered,

    #[error("Airline name already taken: {0}")]
    DuplicateName(String),

    #[error("Voter has already endorsed this candidate")]
    DuplicateVote,

    #[error("Airline is already funded")]
    AlreadyFunded,

    #[error("Passenger is already insured for flight {0}")]
    AlreadyInsured(String),

    #[error("No open status request for this key")]
    RequestNotOpen,

    #[error("Status request has expired")]
    RequestExpired,

    #[error("Index {0} is not assigned to this reporter")]
    IndexMismatch(u8),

    #[error("Contract is not operational")]
    NotOperational,

    #[error("Bootstrap authority expired: the airline registry is not empty")]
    BootstrapExpired,

    // ============ Validation Errors ============
    #[error("Premium too high: cap {cap}, provided {provided}")]
    PremiumTooHigh { cap: Amount, provided: Amount },

    #[error("Premium must be greater than zero")]
    InvalidPremium,

    #[error("Funding too low: minimum {minimum}, provided {provided}")]
    FundingTooLow { minimum: Amount, provided: Amount },

    #[error("Registration fee too low: required {required}, provided {provided}")]
    RegistrationFeeTooLow { required: Amount, provided: Amount },

    #[error("Status code is unknown")]
    UnknownStatus,

    #[error("Flight {0} is not owned by the given airline")]
    FlightOwnerMismatch(String),

    #[error("Reported airline does not own flight {0}")]
    OwnerMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ============ Resource Errors ============
    #[error("Insufficient credit: requested {requested}, available {available}")]
    InsufficientCredit { requested: Amount, available: Amount },

    #[error("Insurance is not active for flight {0}")]
    InsuranceNotActive(String),

    #[error("Insufficient treasury: requested {requested}, available {available}")]
    InsufficientTreasury { requested: Amount, available: Amount },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // ============ Fatal Errors ============
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ============ Infrastructure Errors ============
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    StateConflict,
    Validation,
    Resource,
    Fatal,
    Infrastructure,
}

impl SuretyError {
    pub fn kind(&self) -> ErrorKind {
        use SuretyError::*;
        match self {
            ProposerNotFunded | NotAnAirline | AirlineNotFunded | AirlinesCannotWithdraw
            | NotPrivileged | NotAReporter => ErrorKind::Authorization,
            AlreadyRegistered | DuplicateName(_) | DuplicateVote | AlreadyFunded
            | AlreadyInsured(_) | RequestNotOpen | RequestExpired | IndexMismatch(_)
            | NotOperational | BootstrapExpired => ErrorKind::StateConflict,
            PremiumTooHigh { .. } | InvalidPremium | FundingTooLow { .. }
            | RegistrationFeeTooLow { .. } | UnknownStatus | FlightOwnerMismatch(_)
            | OwnerMismatch(_) | InvalidInput(_) | InvalidAddress(_) => ErrorKind::Validation,
            InsufficientCredit { .. } | InsuranceNotActive(_) | InsufficientTreasury { .. }
            | TransferFailed(_) => ErrorKind::Resource,
            InvariantViolation(_) => ErrorKind::Fatal,
            StorageError(_) | SerializationError(_) | DeserializationError(_) | ConfigError(_)
            | Internal(_) | Other(_) => ErrorKind::Infrastructure,
        }
    }
}

impl From<std::io::Error> for SuretyError {
    fn from(err: std::io::Error) -> Self {
        SuretyError::StorageError(err.to_string())
    }
}

impl From<bincode::Error> for SuretyError {
    fn from(err: bincode::Error) -> Self {
        SuretyError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for SuretyError {
    fn from(err: serde_json::Error) -> Self {
        SuretyError::SerializationError(err.to_string())
    }
}
