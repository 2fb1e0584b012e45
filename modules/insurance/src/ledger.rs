//! Insurance ledger - premium escrow, credit and withdrawal

use flightsurety_core::{
    Address, Amount, InsuranceConfig, StatusCode, SuretyError, SuretyEvent, SuretyResult,
};
use flightsurety_state::StagedState;
use tracing::{debug, info};

use crate::payout::Payout;

/// Insurance settlement ledger
pub struct InsuranceLedger {
    config: InsuranceConfig,
}

impl InsuranceLedger {
    pub fn new(config: InsuranceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InsuranceConfig {
        &self.config
    }

    /// Escrow a premium for `passenger` on `flight`
    pub async fn buy_insurance(
        &self,
        state: &mut StagedState<'_>,
        passenger: Address,
        airline: Address,
        flight: &str,
        premium: Amount,
    ) -> SuretyResult<()> {
        if premium.is_zero() {
            return Err(SuretyError::InvalidPremium);
        }
        if premium > self.config.premium_cap {
            return Err(SuretyError::PremiumTooHigh {
                cap: self.config.premium_cap,
                provided: premium,
            });
        }

        let record = state
            .flight(flight)
            .await?
            .filter(|f| f.registered)
            .ok_or_else(|| SuretyError::InsuranceNotActive(flight.to_string()))?;
        if record.airline != airline {
            return Err(SuretyError::FlightOwnerMismatch(flight.to_string()));
        }
        if record.status == StatusCode::LateAirline {
            return Err(SuretyError::InsuranceNotActive(flight.to_string()));
        }
        if !state.premium(&passenger, flight).await?.is_zero() {
            return Err(SuretyError::AlreadyInsured(flight.to_string()));
        }

        state.put_premium(&passenger, flight, premium)?;
        let mut insurees = state.insurees(flight).await?;
        if !insurees.contains(&passenger) {
            insurees.push(passenger);
            state.put_insurees(flight, &insurees)?;
        }
        state.deposit(premium).await?;
        state.emit(SuretyEvent::InsurancePurchased {
            passenger,
            flight: flight.to_string(),
            premium,
        });

        info!("Passenger {} insured {} for {}", passenger, flight, premium);
        Ok(())
    }

    /// Credit every insuree of `flight` with 1.5x their premium.
    ///
    /// A zero premium on the list means the flight was already credited;
    /// the sweep then fails as a whole.
    pub async fn credit_sweep(
        &self,
        state: &mut StagedState<'_>,
        flight: &str,
    ) -> SuretyResult<Amount> {
        let mut total = Amount::ZERO;

        for passenger in state.insurees(flight).await? {
            let premium = state.premium(&passenger, flight).await?;
            if premium.is_zero() {
                return Err(SuretyError::InvariantViolation(format!(
                    "premium of {} on {} already credited",
                    passenger, flight
                )));
            }
            let payout = premium.payout_for_premium().ok_or_else(|| {
                SuretyError::InvariantViolation(format!("payout overflow for {}", passenger))
            })?;
            let credit = state
                .credit(&passenger)
                .await?
                .checked_add(payout)
                .ok_or_else(|| {
                    SuretyError::InvariantViolation(format!("credit overflow for {}", passenger))
                })?;

            state.put_premium(&passenger, flight, Amount::ZERO)?;
            state.put_credit(&passenger, credit)?;
            state.emit(SuretyEvent::PassengerCredited {
                passenger,
                flight: flight.to_string(),
                amount: payout,
            });
            debug!("Credited {} to {} for {}", payout, passenger, flight);

            total = total.saturating_add(payout);
        }

        info!("Credit sweep for {} paid out {}", flight, total);
        Ok(total)
    }

    /// Pay out `amount` of a passenger's credit
    pub async fn withdraw(
        &self,
        state: &mut StagedState<'_>,
        payout: &dyn Payout,
        passenger: Address,
        amount: Amount,
    ) -> SuretyResult<()> {
        let available = state.credit(&passenger).await?;
        let remaining = available
            .checked_sub(amount)
            .ok_or(SuretyError::InsufficientCredit {
                requested: amount,
                available,
            })?;
        if state.is_registered_airline(&passenger).await? {
            return Err(SuretyError::AirlinesCannotWithdraw);
        }

        let treasury = state.treasury().await?;
        let treasury_left =
            treasury
                .checked_sub(amount)
                .ok_or(SuretyError::InsufficientTreasury {
                    requested: amount,
                    available: treasury,
                })?;

        state.put_credit(&passenger, remaining)?;
        state.put_treasury(treasury_left)?;
        payout.transfer(&passenger, amount).await?;
        state.emit(SuretyEvent::CreditWithdrawn { passenger, amount });

        info!("Passenger {} withdrew {}", passenger, amount);
        Ok(())
    }

    pub async fn credit(&self, state: &StagedState<'_>, passenger: &Address) -> SuretyResult<Amount> {
        state.credit(passenger).await
    }

    pub async fn premium(
        &self,
        state: &StagedState<'_>,
        passenger: &Address,
        flight: &str,
    ) -> SuretyResult<Amount> {
        state.premium(passenger, flight).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::WalletBook;
    use flightsurety_core::{StateMutator, Timestamp};
    use flightsurety_state::{AirlineRecord, FlightRecord, MemoryStateStore};

    fn airline() -> Address {
        Address([1u8; 32])
    }

    fn passenger(n: u8) -> Address {
        Address([0x40 + n; 32])
    }

    fn ledger() -> InsuranceLedger {
        InsuranceLedger::new(InsuranceConfig::default())
    }

    /// Funded airline owning FS1, with its funding in the treasury
    async fn seeded_store() -> MemoryStateStore {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let mut record = AirlineRecord::admitted("Acme Air");
        record.funded = true;
        record.fund = Amount::from_coins(10);
        staged.put_airline(&airline(), &record).unwrap();
        staged.set_airline_count(1).unwrap();
        staged.deposit(Amount::from_coins(10)).await.unwrap();
        staged
            .put_flight(&FlightRecord::new("FS1", airline(), Timestamp::from_millis(1)))
            .unwrap();
        let (changes, _) = staged.into_parts();
        store.apply_batch(changes).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_buy_insurance_validation() {
        let store = seeded_store().await;
        let ledger = ledger();
        let mut staged = StagedState::new(&store);
        let cap = ledger.config().premium_cap;

        let zero = ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", Amount::ZERO)
            .await;
        assert!(matches!(zero, Err(SuretyError::InvalidPremium)));

        let high = ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", Amount::new(cap.0 + 1))
            .await;
        assert!(matches!(high, Err(SuretyError::PremiumTooHigh { .. })));

        let wrong_owner = ledger
            .buy_insurance(&mut staged, passenger(1), Address([2u8; 32]), "FS1", cap)
            .await;
        assert!(matches!(wrong_owner, Err(SuretyError::FlightOwnerMismatch(_))));

        let unknown_flight = ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS9", cap)
            .await;
        assert!(matches!(unknown_flight, Err(SuretyError::InsuranceNotActive(_))));

        ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", cap)
            .await
            .unwrap();
        let top_up = ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", Amount::new(1))
            .await;
        assert!(matches!(top_up, Err(SuretyError::AlreadyInsured(_))));

        assert_eq!(staged.insurees("FS1").await.unwrap(), vec![passenger(1)]);
        assert_eq!(ledger.premium(&staged, &passenger(1), "FS1").await.unwrap(), cap);
    }

    #[tokio::test]
    async fn test_buy_sweep_withdraw() {
        let store = seeded_store().await;
        let ledger = ledger();
        let wallets = WalletBook::new();
        let mut staged = StagedState::new(&store);

        // Odd premium: 1.5x rounds down
        let premium = Amount::new(333);
        ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", premium)
            .await
            .unwrap();
        ledger
            .buy_insurance(&mut staged, passenger(2), airline(), "FS1", Amount::new(100))
            .await
            .unwrap();

        let total = ledger.credit_sweep(&mut staged, "FS1").await.unwrap();
        assert_eq!(total, Amount::new(499 + 150));
        assert_eq!(ledger.credit(&staged, &passenger(1)).await.unwrap(), Amount::new(499));
        assert_eq!(ledger.premium(&staged, &passenger(1), "FS1").await.unwrap(), Amount::ZERO);

        ledger
            .withdraw(&mut staged, &wallets, passenger(1), Amount::new(499))
            .await
            .unwrap();
        assert_eq!(ledger.credit(&staged, &passenger(1)).await.unwrap(), Amount::ZERO);
        assert_eq!(wallets.balance(&passenger(1)), Amount::new(499));

        let again = ledger
            .withdraw(&mut staged, &wallets, passenger(1), Amount::new(1))
            .await;
        assert!(matches!(again, Err(SuretyError::InsufficientCredit { .. })));
    }

    #[tokio::test]
    async fn test_second_sweep_rejected() {
        let store = seeded_store().await;
        let ledger = ledger();
        let mut staged = StagedState::new(&store);

        ledger
            .buy_insurance(&mut staged, passenger(1), airline(), "FS1", Amount::new(10))
            .await
            .unwrap();
        ledger.credit_sweep(&mut staged, "FS1").await.unwrap();

        let second = ledger.credit_sweep(&mut staged, "FS1").await;
        assert!(matches!(second, Err(SuretyError::InvariantViolation(_))));
        assert_eq!(ledger.credit(&staged, &passenger(1)).await.unwrap(), Amount::new(15));
    }

    #[tokio::test]
    async fn test_airline_cannot_withdraw() {
        let store = seeded_store().await;
        let ledger = ledger();
        let wallets = WalletBook::new();
        let mut staged = StagedState::new(&store);

        // Credit planted directly, as a data-entry error would
        staged.put_credit(&airline(), Amount::new(50)).unwrap();
        let result = ledger
            .withdraw(&mut staged, &wallets, airline(), Amount::new(50))
            .await;
        assert!(matches!(result, Err(SuretyError::AirlinesCannotWithdraw)));
        assert_eq!(wallets.balance(&airline()), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_credit() {
        let store = seeded_store().await;
        let ledger = ledger();
        let wallets = WalletBook::new();

        let mut staged = StagedState::new(&store);
        staged.put_credit(&Address::ZERO, Amount::new(30)).unwrap();
        let (changes, _) = staged.into_parts();
        store.apply_batch(changes).await.unwrap();

        let mut staged = StagedState::new(&store);
        let result = ledger
            .withdraw(&mut staged, &wallets, Address::ZERO, Amount::new(30))
            .await;
        assert!(matches!(result, Err(SuretyError::TransferFailed(_))));
        drop(staged);

        let view = StagedState::new(&store);
        assert_eq!(view.credit(&Address::ZERO).await.unwrap(), Amount::new(30));
        assert_eq!(view.treasury().await.unwrap(), Amount::from_coins(10));
    }

    #[tokio::test]
    async fn test_withdraw_limited_by_treasury() {
        let store = MemoryStateStore::new();
        let ledger = ledger();
        let wallets = WalletBook::new();
        let mut staged = StagedState::new(&store);

        staged.put_credit(&passenger(1), Amount::new(30)).unwrap();
        let result = ledger
            .withdraw(&mut staged, &wallets, passenger(1), Amount::new(30))
            .await;
        assert!(matches!(result, Err(SuretyError::InsufficientTreasury { .. })));
    }
}
