//! Payout rails for withdrawn credit

use async_trait::async_trait;
use dashmap::DashMap;
use flightsurety_core::{Address, Amount, SuretyError, SuretyResult};
use tracing::debug;

/// Moves withdrawn funds to the passenger.
///
/// Called inside the withdrawal's stage; an error aborts the withdrawal.
#[async_trait]
pub trait Payout: Send + Sync {
    async fn transfer(&self, to: &Address, amount: Amount) -> SuretyResult<()>;
}

/// In-process wallet balances credited by withdrawals
#[derive(Debug, Default)]
pub struct WalletBook {
    balances: DashMap<Address, Amount>,
}

impl WalletBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.balances
            .get(address)
            .map(|b| *b.value())
            .unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl Payout for WalletBook {
    async fn transfer(&self, to: &Address, amount: Amount) -> SuretyResult<()> {
        if *to == Address::ZERO {
            return Err(SuretyError::TransferFailed(
                "zero address cannot receive funds".into(),
            ));
        }

        let mut balance = self.balances.entry(*to).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| SuretyError::TransferFailed("wallet balance overflow".into()))?;

        debug!("Paid {} to {}", amount, to);
        Ok(())
    }
}
