//! Ledger records and their key layout

use flightsurety_core::{Address, Amount, StatusCode, SuretyError, SuretyResult, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Airline membership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AirlineRecord {
    pub name: String,
    pub registered: bool,
    pub funded: bool,
    /// Amount contributed when funding
    pub fund: Amount,
}

impl AirlineRecord {
    pub fn admitted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registered: true,
            funded: false,
            fund: Amount::ZERO,
        }
    }
}

/// Flight record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub name: String,
    pub registered: bool,
    pub status: StatusCode,
    pub updated_at: Timestamp,
    pub airline: Address,
}

impl FlightRecord {
    pub fn new(name: impl Into<String>, airline: Address, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            registered: true,
            status: StatusCode::Unknown,
            updated_at: timestamp,
            airline,
        }
    }
}

/// Encode a record for storage
pub fn encode<T: Serialize>(value: &T) -> SuretyResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Decode a stored record
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SuretyResult<T> {
    bincode::deserialize(bytes).map_err(|e| SuretyError::DeserializationError(e.to_string()))
}

const AIRLINE_PREFIX: &[u8] = b"airline:";
const AIRLINE_NAME_PREFIX: &[u8] = b"airline-name:";
const FLIGHT_PREFIX: &[u8] = b"flight:";
const PREMIUM_PREFIX: &[u8] = b"premium:";
const INSUREES_PREFIX: &[u8] = b"insurees:";
const CREDIT_PREFIX: &[u8] = b"credit:";

pub const AIRLINE_COUNT_KEY: &[u8] = b"meta:airline-count";
pub const OPERATIONAL_KEY: &[u8] = b"meta:operational";
pub const TREASURY_KEY: &[u8] = b"meta:treasury";

fn prefixed(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

pub fn airline_key(airline: &Address) -> Vec<u8> {
    prefixed(AIRLINE_PREFIX, &[airline.as_bytes()])
}

pub fn airline_name_key(name: &str) -> Vec<u8> {
    prefixed(AIRLINE_NAME_PREFIX, &[name.as_bytes()])
}

pub fn flight_key(flight: &str) -> Vec<u8> {
    prefixed(FLIGHT_PREFIX, &[flight.as_bytes()])
}

/// Addresses are fixed width, so the flight name can follow without a separator
pub fn premium_key(passenger: &Address, flight: &str) -> Vec<u8> {
    prefixed(PREMIUM_PREFIX, &[passenger.as_bytes(), flight.as_bytes()])
}

pub fn insurees_key(flight: &str) -> Vec<u8> {
    prefixed(INSUREES_PREFIX, &[flight.as_bytes()])
}

pub fn credit_key(passenger: &Address) -> Vec<u8> {
    prefixed(CREDIT_PREFIX, &[passenger.as_bytes()])
}

/// Parse the address out of an airline key
pub fn parse_airline_key(key: &[u8]) -> Option<Address> {
    let rest = key.strip_prefix(AIRLINE_PREFIX)?;
    let bytes: [u8; 32] = rest.try_into().ok()?;
    Some(Address::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_encoding() {
        let record = FlightRecord::new("FS101", Address([7u8; 32]), Timestamp::from_millis(99));
        let restored: FlightRecord = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.status, StatusCode::Unknown);
    }

    #[test]
    fn test_airline_key_roundtrip() {
        let address = Address([1u8; 32]);
        assert_eq!(parse_airline_key(&airline_key(&address)), Some(address));
        assert_eq!(parse_airline_key(&airline_name_key("Acme")), None);
    }

    #[test]
    fn test_premium_keys_distinct_per_passenger() {
        let a = premium_key(&Address([1u8; 32]), "FS101");
        let b = premium_key(&Address([2u8; 32]), "FS101");
        assert_ne!(a, b);
        assert_ne!(premium_key(&Address([1u8; 32]), "FS102"), a);
    }
}
