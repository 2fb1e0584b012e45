//! Airline membership consensus
//!
//! The first `multiparty_threshold` airlines are admitted on the word of a
//! single funded member. From then on a candidate needs endorsements from
//! half of the registered airlines (rounded down), each voter counted once.

use flightsurety_core::{
    Address, Amount, MembershipConfig, SuretyError, SuretyEvent, SuretyResult,
};
use flightsurety_state::{AirlineRecord, StagedState};
use tracing::{debug, info};

use crate::ballot::{ballot_key, required_votes, BallotBox};

/// One-shot capability to admit the first airline without being a member.
///
/// Consumed on use, and refused once any airline is registered.
#[derive(Debug)]
pub struct BootstrapAuthority {
    deployer: Address,
}

impl BootstrapAuthority {
    pub fn new(deployer: Address) -> Self {
        Self { deployer }
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }
}

/// Who is putting a candidate forward
#[derive(Debug)]
pub enum Proposer {
    Airline(Address),
    Bootstrap(BootstrapAuthority),
}

/// Outcome of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    pub vote_count: usize,
}

/// Membership consensus engine
pub struct MembershipEngine {
    config: MembershipConfig,
}

impl MembershipEngine {
    pub fn new(config: MembershipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    /// Propose `candidate` under `name`, voting for it if a ballot is needed
    pub async fn propose_airline(
        &self,
        state: &mut StagedState<'_>,
        candidate: Address,
        name: &str,
        proposer: Proposer,
    ) -> SuretyResult<Admission> {
        let registered = state.airline_count().await?;

        let voter = match proposer {
            Proposer::Bootstrap(authority) => {
                if registered > 0 {
                    return Err(SuretyError::BootstrapExpired);
                }
                self.ensure_admissible(state, &candidate, name).await?;
                self.admit(state, candidate, name, registered, 0).await?;
                info!(
                    "Bootstrap airline {} ({}) admitted by deployer {}",
                    name,
                    candidate,
                    authority.deployer()
                );
                return Ok(Admission {
                    admitted: true,
                    vote_count: 0,
                });
            }
            Proposer::Airline(voter) => voter,
        };

        let record = state
            .airline(&voter)
            .await?
            .filter(|a| a.registered)
            .ok_or(SuretyError::NotAnAirline)?;
        if !record.funded {
            return Err(SuretyError::ProposerNotFunded);
        }

        self.ensure_admissible(state, &candidate, name).await?;

        if registered < self.config.multiparty_threshold {
            self.admit(state, candidate, name, registered, 0).await?;
            return Ok(Admission {
                admitted: true,
                vote_count: 0,
            });
        }

        let key = ballot_key(&candidate);
        let mut ballot: BallotBox = state.read(&key).await?.unwrap_or_default();
        if !ballot.add(voter) {
            debug!("Duplicate vote from {} for {}", voter, candidate);
            return Err(SuretyError::DuplicateVote);
        }
        let vote_count = ballot.len();
        state.write(key, &ballot)?;
        state.emit(SuretyEvent::MembershipVoteCast {
            candidate,
            voter,
            count: vote_count,
        });

        let required = required_votes(registered);
        if ballot.has_quorum(required) {
            self.admit(state, candidate, name, registered, vote_count)
                .await?;
            Ok(Admission {
                admitted: true,
                vote_count,
            })
        } else {
            info!(
                "Vote for {} from {}: {}/{} votes",
                candidate, voter, vote_count, required
            );
            Ok(Admission {
                admitted: false,
                vote_count,
            })
        }
    }

    /// Supply the airline's minimum funding
    pub async fn fund_airline(
        &self,
        state: &mut StagedState<'_>,
        airline: Address,
        amount: Amount,
    ) -> SuretyResult<()> {
        let mut record = state
            .airline(&airline)
            .await?
            .filter(|a| a.registered)
            .ok_or(SuretyError::NotAnAirline)?;

        if record.funded {
            return Err(SuretyError::AlreadyFunded);
        }
        if amount < self.config.minimum_fund {
            return Err(SuretyError::FundingTooLow {
                minimum: self.config.minimum_fund,
                provided: amount,
            });
        }

        record.funded = true;
        record.fund = amount;
        state.put_airline(&airline, &record)?;
        state.deposit(amount).await?;
        state.emit(SuretyEvent::AirlineFunded { airline, amount });

        info!("Airline {} ({}) funded with {}", record.name, airline, amount);
        Ok(())
    }

    /// Current ballot for a candidate
    pub async fn ballot(
        &self,
        state: &StagedState<'_>,
        candidate: &Address,
    ) -> SuretyResult<BallotBox> {
        Ok(state.read(&ballot_key(candidate)).await?.unwrap_or_default())
    }

    async fn ensure_admissible(
        &self,
        state: &StagedState<'_>,
        candidate: &Address,
        name: &str,
    ) -> SuretyResult<()> {
        if state.is_registered_airline(candidate).await? {
            return Err(SuretyError::AlreadyRegistered);
        }
        if state.airline_by_name(name).await?.is_some() {
            return Err(SuretyError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    async fn admit(
        &self,
        state: &mut StagedState<'_>,
        candidate: Address,
        name: &str,
        registered: usize,
        votes: usize,
    ) -> SuretyResult<()> {
        state.put_airline(&candidate, &AirlineRecord::admitted(name))?;
        state.put_airline_name(name, &candidate)?;
        state.set_airline_count(registered + 1)?;
        state.emit(SuretyEvent::AirlineAdmitted {
            airline: candidate,
            name: name.to_string(),
            votes,
        });

        info!(
            "Airline {} ({}) admitted with {} votes, {} members",
            name,
            candidate,
            votes,
            registered + 1
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightsurety_core::StateMutator;
    use flightsurety_state::MemoryStateStore;

    fn airline(n: u8) -> Address {
        Address([n; 32])
    }

    fn engine() -> MembershipEngine {
        MembershipEngine::new(MembershipConfig::default())
    }

    async fn commit(store: &MemoryStateStore, staged: StagedState<'_>) {
        let (changes, _) = staged.into_parts();
        store.apply_batch(changes).await.unwrap();
    }

    /// Bootstrap airline 1, then admit and fund 2..=count
    async fn seed(store: &MemoryStateStore, engine: &MembershipEngine, count: u8) {
        let fund = engine.config().minimum_fund;

        let mut staged = StagedState::new(store);
        engine
            .propose_airline(
                &mut staged,
                airline(1),
                "Airline 1",
                Proposer::Bootstrap(BootstrapAuthority::new(airline(0))),
            )
            .await
            .unwrap();
        engine.fund_airline(&mut staged, airline(1), fund).await.unwrap();
        commit(store, staged).await;

        for n in 2..=count {
            let mut staged = StagedState::new(store);
            let admission = engine
                .propose_airline(
                    &mut staged,
                    airline(n),
                    &format!("Airline {}", n),
                    Proposer::Airline(airline(1)),
                )
                .await
                .unwrap();
            assert!(admission.admitted);
            engine.fund_airline(&mut staged, airline(n), fund).await.unwrap();
            commit(store, staged).await;
        }
    }

    #[tokio::test]
    async fn test_first_four_need_no_votes() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 4).await;

        let staged = StagedState::new(&store);
        assert_eq!(staged.airline_count().await.unwrap(), 4);
        for n in 1..=4 {
            assert!(staged.is_registered_airline(&airline(n)).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_bootstrap_expires_after_first_admission() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 1).await;

        let mut staged = StagedState::new(&store);
        let result = engine
            .propose_airline(
                &mut staged,
                airline(2),
                "Airline 2",
                Proposer::Bootstrap(BootstrapAuthority::new(airline(0))),
            )
            .await;
        assert!(matches!(result, Err(SuretyError::BootstrapExpired)));
    }

    #[tokio::test]
    async fn test_unfunded_proposer_rejected() {
        let store = MemoryStateStore::new();
        let engine = engine();

        let mut staged = StagedState::new(&store);
        engine
            .propose_airline(
                &mut staged,
                airline(1),
                "Airline 1",
                Proposer::Bootstrap(BootstrapAuthority::new(airline(0))),
            )
            .await
            .unwrap();

        let result = engine
            .propose_airline(&mut staged, airline(2), "Airline 2", Proposer::Airline(airline(1)))
            .await;
        assert!(matches!(result, Err(SuretyError::ProposerNotFunded)));

        let result = engine
            .propose_airline(&mut staged, airline(3), "Airline 3", Proposer::Airline(airline(9)))
            .await;
        assert!(matches!(result, Err(SuretyError::NotAnAirline)));
    }

    #[tokio::test]
    async fn test_fifth_airline_needs_two_distinct_votes() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 4).await;

        let mut staged = StagedState::new(&store);
        let first = engine
            .propose_airline(&mut staged, airline(5), "Airline 5", Proposer::Airline(airline(1)))
            .await
            .unwrap();
        assert_eq!(
            first,
            Admission {
                admitted: false,
                vote_count: 1
            }
        );
        commit(&store, staged).await;

        // Same voter again: rejected, count stays at 1
        let mut staged = StagedState::new(&store);
        let again = engine
            .propose_airline(&mut staged, airline(5), "Airline 5", Proposer::Airline(airline(1)))
            .await;
        assert!(matches!(again, Err(SuretyError::DuplicateVote)));
        assert_eq!(engine.ballot(&staged, &airline(5)).await.unwrap().len(), 1);
        assert!(!staged.is_registered_airline(&airline(5)).await.unwrap());

        let second = engine
            .propose_airline(&mut staged, airline(5), "Airline 5", Proposer::Airline(airline(2)))
            .await
            .unwrap();
        assert_eq!(
            second,
            Admission {
                admitted: true,
                vote_count: 2
            }
        );
        assert_eq!(staged.airline_count().await.unwrap(), 5);

        // Votes after admission are refused
        let late = engine
            .propose_airline(&mut staged, airline(5), "Airline 5", Proposer::Airline(airline(3)))
            .await;
        assert!(matches!(late, Err(SuretyError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 2).await;

        let mut staged = StagedState::new(&store);
        let result = engine
            .propose_airline(&mut staged, airline(7), "Airline 2", Proposer::Airline(airline(1)))
            .await;
        assert!(matches!(result, Err(SuretyError::DuplicateName(_))));

        let result = engine
            .propose_airline(&mut staged, airline(2), "Other", Proposer::Airline(airline(1)))
            .await;
        assert!(matches!(result, Err(SuretyError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_funding_rules() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 1).await;

        let mut staged = StagedState::new(&store);
        engine
            .propose_airline(&mut staged, airline(2), "Airline 2", Proposer::Airline(airline(1)))
            .await
            .unwrap();

        let low = engine
            .fund_airline(&mut staged, airline(2), Amount::from_coins(1))
            .await;
        assert!(matches!(low, Err(SuretyError::FundingTooLow { .. })));

        let fund = Amount::from_coins(12);
        engine.fund_airline(&mut staged, airline(2), fund).await.unwrap();
        let record = staged.airline(&airline(2)).await.unwrap().unwrap();
        assert!(record.funded);
        assert_eq!(record.fund, fund);

        let again = engine.fund_airline(&mut staged, airline(2), fund).await;
        assert!(matches!(again, Err(SuretyError::AlreadyFunded)));

        let stranger = engine.fund_airline(&mut staged, airline(9), fund).await;
        assert!(matches!(stranger, Err(SuretyError::NotAnAirline)));

        // Bootstrap airline's funding plus this one
        assert_eq!(
            staged.treasury().await.unwrap(),
            Amount::from_coins(10).saturating_add(fund)
        );
    }

    #[tokio::test]
    async fn test_quorum_uses_current_member_count() {
        let store = MemoryStateStore::new();
        let engine = engine();
        seed(&store, &engine, 4).await;

        // Admit a fifth with two votes
        let mut staged = StagedState::new(&store);
        for voter in [1, 2] {
            engine
                .propose_airline(&mut staged, airline(5), "Airline 5", Proposer::Airline(airline(voter)))
                .await
                .unwrap();
        }
        engine
            .fund_airline(&mut staged, airline(5), Amount::from_coins(10))
            .await
            .unwrap();
        commit(&store, staged).await;

        // Five members: floor(5 / 2) = 2 votes still suffice
        let mut staged = StagedState::new(&store);
        let first = engine
            .propose_airline(&mut staged, airline(6), "Airline 6", Proposer::Airline(airline(5)))
            .await
            .unwrap();
        assert!(!first.admitted);
        let second = engine
            .propose_airline(&mut staged, airline(6), "Airline 6", Proposer::Airline(airline(3)))
            .await
            .unwrap();
        assert!(second.admitted);
        assert_eq!(staged.events().iter().filter(|e| matches!(e, SuretyEvent::MembershipVoteCast { .. })).count(), 2);
    }
}
