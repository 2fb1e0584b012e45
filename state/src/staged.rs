//! Staged write-set over a ledger store.
//!
//! Every operation runs against a `StagedState`: reads see the operation's own
//! pending writes first, then the committed store. Nothing reaches the store
//! until the caller turns the stage into a batch, so an operation that fails
//! halfway leaves no trace.

use flightsurety_core::{
    Address, Amount, StateChange, StateProvider, SuretyEvent, SuretyResult,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;

use crate::records::{
    airline_key, airline_name_key, credit_key, decode, encode, flight_key, insurees_key,
    premium_key, AirlineRecord, FlightRecord, AIRLINE_COUNT_KEY, OPERATIONAL_KEY, TREASURY_KEY,
};

/// Pending writes and events of one operation
pub struct StagedState<'a> {
    base: &'a dyn StateProvider,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    events: Vec<SuretyEvent>,
}

impl<'a> StagedState<'a> {
    pub fn new(base: &'a dyn StateProvider) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub async fn get(&self, key: &[u8]) -> SuretyResult<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.base.get(key).await,
        }
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &[u8]) -> SuretyResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn write<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> SuretyResult<()> {
        let bytes = encode(value)?;
        self.set(key, bytes);
        Ok(())
    }

    /// Queue an event; it is published only if the stage commits
    pub fn emit(&mut self, event: SuretyEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SuretyEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Split into the batch to commit and the events to publish after it
    pub fn into_parts(self) -> (Vec<StateChange>, Vec<SuretyEvent>) {
        let changes = self
            .writes
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => StateChange::Set { key, value },
                None => StateChange::Delete { key },
            })
            .collect();
        (changes, self.events)
    }

    // ============ Airlines ============

    pub async fn airline(&self, airline: &Address) -> SuretyResult<Option<AirlineRecord>> {
        self.read(&airline_key(airline)).await
    }

    pub fn put_airline(&mut self, airline: &Address, record: &AirlineRecord) -> SuretyResult<()> {
        self.write(airline_key(airline), record)
    }

    pub async fn is_registered_airline(&self, airline: &Address) -> SuretyResult<bool> {
        Ok(self
            .airline(airline)
            .await?
            .map(|a| a.registered)
            .unwrap_or(false))
    }

    pub async fn airline_by_name(&self, name: &str) -> SuretyResult<Option<Address>> {
        self.read(&airline_name_key(name)).await
    }

    pub fn put_airline_name(&mut self, name: &str, airline: &Address) -> SuretyResult<()> {
        self.write(airline_name_key(name), airline)
    }

    pub async fn airline_count(&self) -> SuretyResult<usize> {
        Ok(self.read::<u64>(AIRLINE_COUNT_KEY).await?.unwrap_or(0) as usize)
    }

    pub fn set_airline_count(&mut self, count: usize) -> SuretyResult<()> {
        self.write(AIRLINE_COUNT_KEY.to_vec(), &(count as u64))
    }

    // ============ Flights ============

    pub async fn flight(&self, flight: &str) -> SuretyResult<Option<FlightRecord>> {
        self.read(&flight_key(flight)).await
    }

    pub fn put_flight(&mut self, record: &FlightRecord) -> SuretyResult<()> {
        self.write(flight_key(&record.name), record)
    }

    // ============ Premiums and credit ============

    /// Premium escrowed by a passenger; zero once credited or never bought
    pub async fn premium(&self, passenger: &Address, flight: &str) -> SuretyResult<Amount> {
        Ok(self
            .read(&premium_key(passenger, flight))
            .await?
            .unwrap_or(Amount::ZERO))
    }

    pub fn put_premium(
        &mut self,
        passenger: &Address,
        flight: &str,
        premium: Amount,
    ) -> SuretyResult<()> {
        self.write(premium_key(passenger, flight), &premium)
    }

    pub async fn insurees(&self, flight: &str) -> SuretyResult<Vec<Address>> {
        Ok(self.read(&insurees_key(flight)).await?.unwrap_or_default())
    }

    pub fn put_insurees(&mut self, flight: &str, insurees: &[Address]) -> SuretyResult<()> {
        self.write(insurees_key(flight), &insurees)
    }

    pub async fn credit(&self, passenger: &Address) -> SuretyResult<Amount> {
        Ok(self
            .read(&credit_key(passenger))
            .await?
            .unwrap_or(Amount::ZERO))
    }

    pub fn put_credit(&mut self, passenger: &Address, credit: Amount) -> SuretyResult<()> {
        self.write(credit_key(passenger), &credit)
    }

    // ============ Contract-wide ============

    pub async fn treasury(&self) -> SuretyResult<Amount> {
        Ok(self.read(TREASURY_KEY).await?.unwrap_or(Amount::ZERO))
    }

    pub fn put_treasury(&mut self, treasury: Amount) -> SuretyResult<()> {
        self.write(TREASURY_KEY.to_vec(), &treasury)
    }

    /// Add incoming funds to the treasury
    pub async fn deposit(&mut self, amount: Amount) -> SuretyResult<()> {
        let treasury = self.treasury().await?.saturating_add(amount);
        self.put_treasury(treasury)
    }

    pub async fn is_operational(&self) -> SuretyResult<bool> {
        Ok(self.read(OPERATIONAL_KEY).await?.unwrap_or(true))
    }

    pub fn set_operational(&mut self, operational: bool) -> SuretyResult<()> {
        self.write(OPERATIONAL_KEY.to_vec(), &operational)
    }
}
