//! Proposal validation pipeline.
//!
//! Every proposal runs through a fixed, ordered list of pure validator
//! functions before any state mutation:
//!
//! 1. **Permission** - the caller holds a slot in the committed base round
//! 2. **Timing** - slot windows for continuations, spacing and extra-block
//!    authorization for transitions
//! 3. **Round structure** - numbering increments, fresh rounds carry no
//!    commitment values, orders follow the deterministic assignment engine
//! 4. **Order uniqueness** - next-round order *values* of mined slots are
//!    pairwise distinct
//! 5. **Miner-set continuity** - same-term transitions keep the miner set
//! 6. **Irreversibility monotonicity** - confirmed heights never regress
//!
//! The pipeline short-circuits on the first failure; a rejected proposal has
//! zero side effects. Validators are plain functions over a
//! [`ValidationContext`], so each check is unit-testable in isolation.

use dposcore_config::ConsensusConfig;
use dposcore_types::{MinerPublicKey, Timestamp};
use thiserror::Error;
use tracing::debug;

use crate::round_generation::next_round_order_map;
use crate::types::{
    ConsensusBehaviour, ProposalPayload, Round, RoundNumber, RoundTransitionPayload,
    SignedProposal,
};

/// Rejection categories for proposal validation.
///
/// All variants except [`ValidationError::OrderAssignmentExhausted`] are
/// recoverable: the proposal is dropped, committed state is untouched, and
/// the caller may retry. `OrderAssignmentExhausted` signals a defect that
/// should be impossible by construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Caller does not hold a slot in the base round.
    #[error("permission denied: {miner} holds no slot in round {round_number}")]
    PermissionDenied {
        /// The rejected caller.
        miner: MinerPublicKey,
        /// The base round.
        round_number: RoundNumber,
    },

    /// Action attempted outside the legal time window.
    #[error("timing violation for {miner} at {at}: {detail}")]
    TimingViolation {
        /// The rejected caller.
        miner: MinerPublicKey,
        /// The offending time.
        at: Timestamp,
        /// What was wrong with it.
        detail: String,
    },

    /// Round/term numbering or freshness rules violated.
    #[error("structural mismatch: {detail}")]
    StructuralMismatch {
        /// What was wrong.
        detail: String,
    },

    /// Duplicate next-round order value.
    #[error("order conflict: order {order} assigned to more than one miner")]
    OrderConflict {
        /// The duplicated order value.
        order: u32,
    },

    /// Miner set changed outside the election path.
    #[error("miner set mismatch: {detail}")]
    MinerSetMismatch {
        /// What was wrong.
        detail: String,
    },

    /// Proposed irreversibility regresses the committed values.
    #[error(
        "stale irreversibility: proposed height {proposed_height} (round {proposed_round}) \
         below committed {base_height} (round {base_round})"
    )]
    StaleIrreversibility {
        /// Committed irreversible height.
        base_height: u64,
        /// Committed irreversible round number.
        base_round: RoundNumber,
        /// Proposed irreversible height.
        proposed_height: u64,
        /// Proposed irreversible round number.
        proposed_round: RoundNumber,
    },

    /// A reveal does not open the prior-round commitment.
    #[error("reveal validation failed for {miner}")]
    RevealValidationFailed {
        /// The miner whose slot the reveal targeted.
        miner: MinerPublicKey,
    },

    /// Commitment preconditions not met.
    #[error("invalid commitment from {miner}: {detail}")]
    InvalidCommitment {
        /// The committing miner.
        miner: MinerPublicKey,
        /// Which precondition failed.
        detail: String,
    },

    /// No free next-round order remained. Impossible by construction; treated
    /// as an unrecoverable defect that aborts the proposal.
    #[error("order assignment exhausted resolving a collision for {miner}")]
    OrderAssignmentExhausted {
        /// The miner being assigned.
        miner: MinerPublicKey,
    },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Everything a validator may inspect. Validators never mutate state.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// The committed round the proposal is based on.
    pub base_round: &'a Round,
    /// The round before the base round, if any (needed for reveal checks).
    pub previous_round: Option<&'a Round>,
    /// The proposal under validation.
    pub proposal: &'a SignedProposal,
    /// Wall-clock time at validation.
    pub now: Timestamp,
    /// Scheduler parameters.
    pub config: &'a ConsensusConfig,
    /// First round of the current term, for term boundary detection.
    pub term_start_round: RoundNumber,
}

impl ValidationContext<'_> {
    /// Whether the base round is the last round of its term.
    pub fn at_term_boundary(&self) -> bool {
        let rounds_in_term = self
            .base_round
            .round_number
            .saturating_sub(self.term_start_round)
            + 1;
        rounds_in_term >= self.config.rounds_per_term
    }

    fn transition_payload(&self) -> ValidationResult<&RoundTransitionPayload> {
        match &self.proposal.payload {
            ProposalPayload::RoundTransition(payload) => Ok(payload),
            _ => Err(ValidationError::StructuralMismatch {
                detail: format!(
                    "behaviour {} requires a round transition payload",
                    self.proposal.behaviour
                ),
            }),
        }
    }

    fn continuation_time(&self) -> ValidationResult<Timestamp> {
        match &self.proposal.payload {
            ProposalPayload::UpdateValue(payload) => Ok(payload.actual_mining_time),
            ProposalPayload::TinyBlock(payload) => Ok(payload.actual_mining_time),
            ProposalPayload::RoundTransition(_) => Err(ValidationError::StructuralMismatch {
                detail: format!(
                    "behaviour {} requires a same-round payload",
                    self.proposal.behaviour
                ),
            }),
        }
    }
}

/// A single validation stage.
pub type Validator = fn(&ValidationContext<'_>) -> ValidationResult<()>;

/// The ordered validator chain for a behaviour tag.
///
/// Represented as a fixed list of pure functions so the mapping from
/// behaviour to applicable checks stays exhaustively reviewable.
pub fn pipeline_for(behaviour: ConsensusBehaviour) -> &'static [Validator] {
    match behaviour {
        ConsensusBehaviour::Nothing => &[],
        ConsensusBehaviour::UpdateValue | ConsensusBehaviour::TinyBlock => &[
            validate_permission,
            validate_continuation_timing,
            validate_order_uniqueness,
        ],
        ConsensusBehaviour::NextRound | ConsensusBehaviour::NextTerm => &[
            validate_permission,
            validate_transition_timing,
            validate_round_structure,
            validate_order_uniqueness,
            validate_miner_set_continuity,
            validate_irreversibility,
        ],
    }
}

/// Runs the full pre-execution pipeline, short-circuiting on first failure.
pub fn run_pipeline(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    if ctx.proposal.behaviour == ConsensusBehaviour::Nothing {
        return Err(ValidationError::StructuralMismatch {
            detail: "proposal carries no actionable behaviour".into(),
        });
    }
    if ctx.proposal.round_number != ctx.base_round.round_number
        || ctx.proposal.term_number != ctx.base_round.term_number
    {
        return Err(ValidationError::StructuralMismatch {
            detail: format!(
                "proposal references round {} term {}, committed state is round {} term {}",
                ctx.proposal.round_number,
                ctx.proposal.term_number,
                ctx.base_round.round_number,
                ctx.base_round.term_number
            ),
        });
    }
    for validator in pipeline_for(ctx.proposal.behaviour) {
        validator(ctx)?;
    }
    debug!(
        miner = %ctx.proposal.public_key,
        behaviour = %ctx.proposal.behaviour,
        round = ctx.base_round.round_number,
        "proposal passed pre-execution validation"
    );
    Ok(())
}

/// Stage 1: the caller must hold a slot in the committed base round.
pub fn validate_permission(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    if !ctx.base_round.is_slot_holder(&ctx.proposal.public_key) {
        return Err(ValidationError::PermissionDenied {
            miner: ctx.proposal.public_key,
            round_number: ctx.base_round.round_number,
        });
    }
    Ok(())
}

/// Stage 2 (continuations): the claimed mining time must fall inside the
/// caller's own slot window.
///
/// Two exceptions mirror the behaviour state machine: round 1 carries
/// unreliable expected times and skips the window check, and the previous
/// round's extra block producer may produce before this round's nominal
/// start.
pub fn validate_continuation_timing(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let at = ctx.continuation_time()?;
    let slot = ctx.base_round.slot(&ctx.proposal.public_key).ok_or(
        ValidationError::PermissionDenied {
            miner: ctx.proposal.public_key,
            round_number: ctx.base_round.round_number,
        },
    )?;

    let is_previous_extra = ctx.base_round.extra_block_producer_of_previous_round.as_ref()
        == Some(&ctx.proposal.public_key);
    let before_round_start = ctx
        .base_round
        .start_time()
        .map(|start| at < start)
        .unwrap_or(false);

    if ctx.proposal.behaviour == ConsensusBehaviour::TinyBlock {
        if slot.produced_tiny_blocks >= ctx.config.tiny_blocks_per_slot {
            return Err(ValidationError::TimingViolation {
                miner: ctx.proposal.public_key,
                at,
                detail: "filler budget for this round is exhausted".into(),
            });
        }
        // Fillers follow the miner's own commitment, except for the
        // previous terminator's pre-round window
        if !slot.has_mined() && !(is_previous_extra && before_round_start) {
            return Err(ValidationError::TimingViolation {
                miner: ctx.proposal.public_key,
                at,
                detail: "tiny block before this round's commitment".into(),
            });
        }
    }

    if ctx.base_round.round_number == 1 {
        // Round 1 expected times derive from an arbitrary genesis timestamp
        return Ok(());
    }

    if slot.is_in_time_slot(at, ctx.config.mining_interval_ms) {
        return Ok(());
    }

    // Pre-round window for the previous round's extra block producer
    if ctx.proposal.behaviour == ConsensusBehaviour::TinyBlock
        && is_previous_extra
        && before_round_start
    {
        return Ok(());
    }

    Err(ValidationError::TimingViolation {
        miner: ctx.proposal.public_key,
        at,
        detail: format!(
            "outside own slot window starting at {}",
            slot.expected_mining_time
        ),
    })
}

/// Stage 2 (transitions): the caller must be the designated extra block
/// producer, the extra block slot must have started, and the proposed
/// round's slots must be equally spaced.
pub fn validate_transition_timing(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let payload = ctx.transition_payload()?;
    let slot = ctx.base_round.slot(&ctx.proposal.public_key).ok_or(
        ValidationError::PermissionDenied {
            miner: ctx.proposal.public_key,
            round_number: ctx.base_round.round_number,
        },
    )?;

    // The extra-block producer check is never skipped for transitions
    if !slot.is_extra_block_producer {
        return Err(ValidationError::TimingViolation {
            miner: ctx.proposal.public_key,
            at: payload.actual_mining_time,
            detail: "caller is not the designated extra block producer".into(),
        });
    }

    if let Some(extra_slot_start) = ctx
        .base_round
        .extra_block_slot_start(ctx.config.mining_interval_ms)
    {
        if ctx.base_round.round_number != 1 && payload.actual_mining_time < extra_slot_start {
            return Err(ValidationError::TimingViolation {
                miner: ctx.proposal.public_key,
                at: payload.actual_mining_time,
                detail: format!(
                    "round termination before the final slot's window passed at {}",
                    extra_slot_start
                ),
            });
        }
    }

    // Proposed slots must be spaced one mining interval apart, within
    // tolerance
    let mut expected_times: Vec<Timestamp> = payload
        .next_round
        .miners
        .values()
        .map(|slot| slot.expected_mining_time)
        .collect();
    expected_times.sort();
    let interval = ctx.config.mining_interval_ms;
    let tolerance = ctx.config.time_slot_tolerance_ms;
    for pair in expected_times.windows(2) {
        let gap = pair[1].millis_since(pair[0]);
        if gap < interval.saturating_sub(tolerance) || gap > interval + tolerance {
            return Err(ValidationError::TimingViolation {
                miner: ctx.proposal.public_key,
                at: payload.actual_mining_time,
                detail: format!(
                    "proposed slot spacing {}ms deviates from interval {}ms beyond tolerance",
                    gap, interval
                ),
            });
        }
    }

    Ok(())
}

/// Stage 3: round/term numbers increment by exactly one, the fresh round
/// carries no commitment values, and same-term orders come from the
/// deterministic assignment engine.
pub fn validate_round_structure(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let payload = ctx.transition_payload()?;
    let next = &payload.next_round;
    let base = ctx.base_round;

    if next.round_number != base.round_number + 1 {
        return Err(ValidationError::StructuralMismatch {
            detail: format!(
                "proposed round number {} does not follow committed round {}",
                next.round_number, base.round_number
            ),
        });
    }

    match ctx.proposal.behaviour {
        ConsensusBehaviour::NextRound => {
            if next.term_number != base.term_number {
                return Err(ValidationError::StructuralMismatch {
                    detail: format!(
                        "same-term transition must keep term {}, proposed {}",
                        base.term_number, next.term_number
                    ),
                });
            }
            if ctx.at_term_boundary() {
                return Err(ValidationError::StructuralMismatch {
                    detail: "term boundary reached: transition must be NextTerm".into(),
                });
            }
            if next.is_miner_list_just_changed {
                return Err(ValidationError::StructuralMismatch {
                    detail: "same-term round cannot claim a miner list change".into(),
                });
            }
        }
        ConsensusBehaviour::NextTerm => {
            if next.term_number != base.term_number + 1 {
                return Err(ValidationError::StructuralMismatch {
                    detail: format!(
                        "proposed term number {} does not follow committed term {}",
                        next.term_number, base.term_number
                    ),
                });
            }
            if !ctx.at_term_boundary() {
                return Err(ValidationError::StructuralMismatch {
                    detail: "term transition proposed before the term boundary".into(),
                });
            }
            if !next.is_miner_list_just_changed {
                return Err(ValidationError::StructuralMismatch {
                    detail: "term transition must mark the miner list as changed".into(),
                });
            }
        }
        other => {
            return Err(ValidationError::StructuralMismatch {
                detail: format!("behaviour {} cannot propose a round transition", other),
            });
        }
    }

    // A brand-new round must carry no commitment or reveal values
    for (key, slot) in &next.miners {
        if slot.out_value.is_some()
            || slot.signature.is_some()
            || slot.previous_in_value.is_some()
            || !slot.actual_mining_times.is_empty()
            || slot.supposed_order_of_next_round != 0
            || slot.final_order_of_next_round != 0
            || slot.produced_tiny_blocks != 0
        {
            return Err(ValidationError::StructuralMismatch {
                detail: format!("fresh round carries pre-populated values for {}", key),
            });
        }
    }

    if !next.orders_form_permutation() {
        return Err(ValidationError::StructuralMismatch {
            detail: "proposed schedule orders are not a permutation of 1..=N".into(),
        });
    }

    // Same-term orders may differ from the base only via the deterministic
    // order-assignment engine
    if ctx.proposal.behaviour == ConsensusBehaviour::NextRound {
        let expected = next_round_order_map(base);
        for (key, slot) in &next.miners {
            match expected.get(key) {
                Some(&order) if order == slot.order => {}
                Some(&order) => {
                    return Err(ValidationError::StructuralMismatch {
                        detail: format!(
                            "order {} for {} deviates from the deterministic assignment {}",
                            slot.order, key, order
                        ),
                    });
                }
                None => {
                    // Continuity stage reports the full set difference
                }
            }
        }
        if next.extra_block_producer_of_previous_round.as_ref()
            != Some(&ctx.proposal.public_key)
        {
            return Err(ValidationError::StructuralMismatch {
                detail: "proposed round must record the terminating caller as previous \
                         extra block producer"
                    .into(),
            });
        }
    }

    Ok(())
}

/// Stage 4: next-round order values of mined slots are pairwise distinct.
///
/// Compares the scalar order values, never the containing records: two
/// distinct slots carrying the same value is exactly the defect this stage
/// exists to catch.
pub fn validate_order_uniqueness(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let mut seen: Vec<u32> = Vec::new();
    for slot in ctx.base_round.mined_slots() {
        let order = slot.final_order_of_next_round;
        if seen.contains(&order) {
            return Err(ValidationError::OrderConflict { order });
        }
        seen.push(order);
    }
    Ok(())
}

/// Stage 5: a same-term transition must keep the miner set exactly.
///
/// Term transitions replace the set wholesale through the election path and
/// are checked against the election collaborator's output by the engine.
pub fn validate_miner_set_continuity(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    if ctx.proposal.behaviour != ConsensusBehaviour::NextRound {
        return Ok(());
    }
    let payload = ctx.transition_payload()?;
    let next = &payload.next_round;

    for key in ctx.base_round.miners.keys() {
        if !next.is_slot_holder(key) {
            return Err(ValidationError::MinerSetMismatch {
                detail: format!("miner {} removed outside the election path", key),
            });
        }
    }
    for key in next.miners.keys() {
        if !ctx.base_round.is_slot_holder(key) {
            return Err(ValidationError::MinerSetMismatch {
                detail: format!("miner {} added outside the election path", key),
            });
        }
    }
    Ok(())
}

/// Stage 6: confirmed irreversibility never regresses.
pub fn validate_irreversibility(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let payload = ctx.transition_payload()?;
    let next = &payload.next_round;
    let base = ctx.base_round;

    if next.confirmed_irreversible_height < base.confirmed_irreversible_height
        || next.confirmed_irreversible_round_number < base.confirmed_irreversible_round_number
    {
        return Err(ValidationError::StaleIrreversibility {
            base_height: base.confirmed_irreversible_height,
            base_round: base.confirmed_irreversible_round_number,
            proposed_height: next.confirmed_irreversible_height,
            proposed_round: next.confirmed_irreversible_round_number,
        });
    }
    Ok(())
}

/// Post-execution consistency check.
///
/// Compares the structural hash of the round the proposer intended against
/// the round actually read back from the committed store. Both values must
/// be obtained independently: mutating one value in place and comparing it
/// to itself would always pass.
pub fn verify_committed_round(intended: &Round, committed: &Round) -> ValidationResult<()> {
    let intended_id = intended.round_id();
    let committed_id = committed.round_id();
    if intended_id != committed_id {
        return Err(ValidationError::StructuralMismatch {
            detail: format!(
                "committed round {} diverges from intended state: {} != {}",
                committed.round_number, committed_id, intended_id
            ),
        });
    }
    Ok(())
}
