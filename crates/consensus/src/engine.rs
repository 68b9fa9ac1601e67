//! The scheduler engine.
//!
//! [`ConsensusEngine`] owns the committed round state and drives every state
//! transition:
//!
//! ```text
//! SignedProposal
//!     │
//!     ▼
//! pre-execution pipeline (validation.rs)
//!     │
//!     ▼
//! working-copy construction (order_assignment / reveal / round_generation)
//!     │
//!     ▼
//! atomic commit (store.rs)
//!     │
//!     ▼
//! post-execution consistency check + LIB notification
//! ```
//!
//! The engine is logically single-threaded per chain: one proposal is
//! processed at a time, transitions apply strictly in order, and a proposal
//! referencing a stale base round is rejected, never merged. A proposal that
//! fails any stage has zero side effects.

use std::sync::Arc;

use dposcore_config::ConsensusConfig;
use dposcore_core::{
    ElectionError, ElectionProvider, MinedBlocksTally, RewardSink, StateBackend, StorageError,
};
use dposcore_types::{MinerPublicKey, Timestamp};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::behaviour::behaviour_for;
use crate::order_assignment::apply_commitment;
use crate::reveal::apply_reveals;
use crate::round_generation::{
    generate_first_round, generate_next_round, generate_next_term_round,
};
use crate::store::RoundStore;
use crate::types::{
    ConsensusBehaviour, MinerListSnapshot, ProposalPayload, Round, RoundNumber, SignedProposal,
    TermNumber,
};
use crate::validation::{
    run_pipeline, verify_committed_round, ValidationContext, ValidationError,
};

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A pipeline stage rejected the proposal; state is unchanged.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The storage backend failed.
    #[error("storage failure: {0}")]
    Store(#[from] StorageError),

    /// The election collaborator failed.
    #[error("election failure: {0}")]
    Election(#[from] ElectionError),

    /// No genesis round has been committed yet.
    #[error("scheduler is not bootstrapped")]
    NotBootstrapped,

    /// Bootstrap attempted over an existing chain.
    #[error("scheduler is already bootstrapped at round {0}")]
    AlreadyBootstrapped(RoundNumber),

    /// The term snapshot for the current term is missing from the store.
    #[error("missing term snapshot for term {0}")]
    MissingTermSnapshot(TermNumber),

    /// The committed state diverges from the intended state; processing of
    /// the proposal is aborted.
    #[error("state corruption at round {round_number}: committed state diverges from intent")]
    StateCorruption {
        /// The round whose post-execution check failed.
        round_number: RoundNumber,
    },
}

/// Result type for engine operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// What a successfully processed proposal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// The behaviour that was executed.
    pub behaviour: ConsensusBehaviour,
    /// The current round number after the commit.
    pub committed_round_number: RoundNumber,
    /// The new irreversible height, when this proposal advanced it.
    pub irreversible_height_advanced: Option<u64>,
}

/// The round-based mining scheduler.
///
/// Owns the committed Round/Term state exclusively; the election and reward
/// collaborators only supply miner lists and receive tallies.
pub struct ConsensusEngine<B: StateBackend> {
    store: RoundStore<B>,
    config: ConsensusConfig,
    election: Arc<dyn ElectionProvider>,
    rewards: Arc<dyn RewardSink>,
    lib_tx: watch::Sender<u64>,
}

impl<B: StateBackend> ConsensusEngine<B> {
    /// Creates an engine over a storage backend and its collaborators.
    pub fn new(
        backend: Arc<B>,
        config: ConsensusConfig,
        election: Arc<dyn ElectionProvider>,
        rewards: Arc<dyn RewardSink>,
    ) -> Self {
        let (lib_tx, _) = watch::channel(0);
        Self {
            store: RoundStore::new(backend),
            config,
            election,
            rewards,
            lib_tx,
        }
    }

    /// Subscribes to irreversible-height-advanced notifications.
    pub fn irreversibility_watch(&self) -> watch::Receiver<u64> {
        self.lib_tx.subscribe()
    }

    /// Commits the genesis round from the election collaborator's output.
    pub fn bootstrap(&self, start_time: Timestamp) -> ConsensusResult<Round> {
        if let Some(existing) = self.store.current_round_number()? {
            return Err(ConsensusError::AlreadyBootstrapped(existing));
        }

        let mut miners = self.election.elected_miners()?;
        if miners.is_empty() {
            return Err(ConsensusError::Election(ElectionError::NoElectedMiners(
                "empty genesis election result".into(),
            )));
        }
        miners.truncate(self.config.maximum_miners_count as usize);

        let round = generate_first_round(&miners, 1, 1, start_time, &self.config);
        let snapshot = MinerListSnapshot {
            term_number: 1,
            start_round_number: 1,
            miners,
        };
        self.store.commit_genesis(&round, &snapshot)?;

        info!(
            miners = round.miner_count(),
            "scheduler bootstrapped at round 1, term 1"
        );
        Ok(round)
    }

    /// The current committed round.
    pub fn current_round(&self) -> ConsensusResult<Round> {
        self.store
            .current_round()?
            .ok_or(ConsensusError::NotBootstrapped)
    }

    /// Decides the single legal action for `miner` at `now`.
    pub fn behaviour_for(
        &self,
        miner: &MinerPublicKey,
        now: Timestamp,
    ) -> ConsensusResult<ConsensusBehaviour> {
        let round = self.current_round()?;
        let at_boundary = self.at_term_boundary(&round)?;
        Ok(behaviour_for(&round, miner, now, &self.config, at_boundary))
    }

    /// Validates and applies a signed proposal.
    ///
    /// Runs the pre-execution pipeline, constructs the new state on working
    /// copies, commits atomically, and verifies the committed state against
    /// the intended one. A rejected proposal leaves the committed rounds
    /// byte-for-byte unchanged.
    pub fn process_proposal(
        &self,
        proposal: &SignedProposal,
        now: Timestamp,
    ) -> ConsensusResult<ProcessOutcome> {
        let base = self.current_round()?;
        let previous = if base.round_number > 1 {
            self.store.round(base.round_number - 1)?
        } else {
            None
        };
        let term_start_round = self.term_start_round(&base)?;

        let ctx = ValidationContext {
            base_round: &base,
            previous_round: previous.as_ref(),
            proposal,
            now,
            config: &self.config,
            term_start_round,
        };
        run_pipeline(&ctx)?;

        match (&proposal.behaviour, &proposal.payload) {
            (ConsensusBehaviour::UpdateValue, ProposalPayload::UpdateValue(payload)) => {
                let mut working = apply_commitment(
                    &base,
                    previous.as_ref(),
                    &proposal.public_key,
                    payload.previous_in_value,
                    payload.out_value,
                    payload.signature,
                )?;
                if let Some(slot) = working.slot_mut(&proposal.public_key) {
                    slot.actual_mining_times.push(payload.actual_mining_time);
                    slot.produced_blocks += 1;
                    slot.implied_irreversible_block_height =
                        payload.implied_irreversible_block_height;
                }
                self.store.commit_round_update(&working)?;
                self.verify_round(&working)?;

                Ok(ProcessOutcome {
                    behaviour: ConsensusBehaviour::UpdateValue,
                    committed_round_number: working.round_number,
                    irreversible_height_advanced: None,
                })
            }

            (ConsensusBehaviour::TinyBlock, ProposalPayload::TinyBlock(payload)) => {
                let mut working = base.clone();
                if let Some(slot) = working.slot_mut(&proposal.public_key) {
                    slot.actual_mining_times.push(payload.actual_mining_time);
                    slot.produced_blocks += 1;
                    slot.produced_tiny_blocks += 1;
                }
                self.store.commit_round_update(&working)?;
                self.verify_round(&working)?;

                Ok(ProcessOutcome {
                    behaviour: ConsensusBehaviour::TinyBlock,
                    committed_round_number: working.round_number,
                    irreversible_height_advanced: None,
                })
            }

            (
                behaviour @ (ConsensusBehaviour::NextRound | ConsensusBehaviour::NextTerm),
                ProposalPayload::RoundTransition(payload),
            ) => {
                // Reveals for silent miners go into the finished base round
                let (mut updated_base, reveal_outcome) =
                    apply_reveals(&base, previous.as_ref(), &payload.reveals);
                if !reveal_outcome.rejected.is_empty() {
                    warn!(
                        round = base.round_number,
                        rejected = reveal_outcome.rejected.len(),
                        "discarded invalid reveals from transition proposal"
                    );
                }
                // The terminating extra block itself
                if let Some(slot) = updated_base.slot_mut(&proposal.public_key) {
                    slot.actual_mining_times.push(payload.actual_mining_time);
                    slot.produced_blocks += 1;
                }

                // The proposed round must equal the deterministic generation
                // from committed state
                let expected_next = match behaviour {
                    ConsensusBehaviour::NextTerm => {
                        let elected = self.verified_election_result(&payload.next_round)?;
                        generate_next_term_round(
                            &elected,
                            &base,
                            previous.as_ref(),
                            &proposal.public_key,
                            payload.actual_mining_time,
                            &self.config,
                        )
                    }
                    _ => generate_next_round(
                        &base,
                        previous.as_ref(),
                        &proposal.public_key,
                        payload.actual_mining_time,
                        &self.config,
                    ),
                };
                if expected_next.round_id() != payload.next_round.round_id() {
                    return Err(ConsensusError::Validation(
                        ValidationError::StructuralMismatch {
                            detail: format!(
                                "proposed round {} deviates from deterministic generation",
                                payload.next_round.round_number
                            ),
                        },
                    ));
                }

                let snapshot = match behaviour {
                    ConsensusBehaviour::NextTerm => Some(MinerListSnapshot {
                        term_number: payload.next_round.term_number,
                        start_round_number: payload.next_round.round_number,
                        miners: payload.next_round.miners.keys().copied().collect(),
                    }),
                    _ => None,
                };

                self.store
                    .commit_transition(&updated_base, &payload.next_round, snapshot.as_ref())?;
                self.verify_round(&updated_base)?;
                self.verify_round(&payload.next_round)?;

                let advanced = payload.next_round.confirmed_irreversible_height
                    > base.confirmed_irreversible_height;
                if advanced {
                    let height = payload.next_round.confirmed_irreversible_height;
                    info!(height, "irreversible height advanced");
                    let _ = self.lib_tx.send(height);
                }

                if *behaviour == ConsensusBehaviour::NextTerm {
                    let tallies = production_tallies(&updated_base);
                    self.rewards.on_term_completed(base.term_number, &tallies);
                    info!(
                        term = base.term_number,
                        miners = tallies.len(),
                        "term completed, tallies emitted"
                    );
                }

                info!(
                    round = payload.next_round.round_number,
                    term = payload.next_round.term_number,
                    behaviour = %behaviour,
                    "round transition committed"
                );
                Ok(ProcessOutcome {
                    behaviour: *behaviour,
                    committed_round_number: payload.next_round.round_number,
                    irreversible_height_advanced: advanced
                        .then_some(payload.next_round.confirmed_irreversible_height),
                })
            }

            (behaviour, _) => Err(ConsensusError::Validation(
                ValidationError::StructuralMismatch {
                    detail: format!("behaviour {} does not match the proposal payload", behaviour),
                },
            )),
        }
    }

    /// Convenience for local proposers: builds the deterministic next round
    /// for a transition the caller is about to propose.
    pub fn build_next_round(
        &self,
        terminator: &MinerPublicKey,
        at: Timestamp,
    ) -> ConsensusResult<Round> {
        let base = self.current_round()?;
        let previous = if base.round_number > 1 {
            self.store.round(base.round_number - 1)?
        } else {
            None
        };
        if self.at_term_boundary(&base)? {
            let mut elected = self.election.elected_miners()?;
            elected.truncate(self.config.maximum_miners_count as usize);
            Ok(generate_next_term_round(
                &elected,
                &base,
                previous.as_ref(),
                terminator,
                at,
                &self.config,
            ))
        } else {
            Ok(generate_next_round(
                &base,
                previous.as_ref(),
                terminator,
                at,
                &self.config,
            ))
        }
    }

    fn term_start_round(&self, round: &Round) -> ConsensusResult<RoundNumber> {
        self.store
            .term_snapshot(round.term_number)?
            .map(|snapshot| snapshot.start_round_number)
            .ok_or(ConsensusError::MissingTermSnapshot(round.term_number))
    }

    fn at_term_boundary(&self, round: &Round) -> ConsensusResult<bool> {
        let start = self.term_start_round(round)?;
        let rounds_in_term = round.round_number.saturating_sub(start) + 1;
        Ok(rounds_in_term >= self.config.rounds_per_term)
    }

    /// Checks the elected miner set against a proposed term round and
    /// returns the (truncated) election result.
    fn verified_election_result(
        &self,
        next_round: &Round,
    ) -> ConsensusResult<Vec<MinerPublicKey>> {
        let mut elected = self.election.elected_miners()?;
        elected.truncate(self.config.maximum_miners_count as usize);

        let mut expected: Vec<MinerPublicKey> = elected.clone();
        expected.sort();
        let proposed: Vec<MinerPublicKey> = next_round.miners.keys().copied().collect();
        if expected != proposed {
            return Err(ConsensusError::Validation(
                ValidationError::MinerSetMismatch {
                    detail: "proposed term round does not adopt the election result".into(),
                },
            ));
        }
        Ok(elected)
    }

    /// Post-execution consistency: the round read back from the store must
    /// hash identically to the intended value. The two inputs are obtained
    /// independently - one constructed by the proposal path, one freshly
    /// deserialized from the committed store.
    fn verify_round(&self, intended: &Round) -> ConsensusResult<()> {
        let committed = self
            .store
            .round(intended.round_number)?
            .ok_or(ConsensusError::StateCorruption {
                round_number: intended.round_number,
            })?;
        verify_committed_round(intended, &committed).map_err(|error| {
            warn!(round = intended.round_number, %error, "post-execution check failed");
            ConsensusError::StateCorruption {
                round_number: intended.round_number,
            }
        })
    }
}

/// Per-miner production tallies for the reward collaborator.
fn production_tallies(round: &Round) -> Vec<MinedBlocksTally> {
    round
        .miners
        .values()
        .map(|slot| MinedBlocksTally {
            miner: slot.public_key,
            blocks_produced: slot.produced_blocks,
        })
        .collect()
}
