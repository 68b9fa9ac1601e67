//! Commit-reveal order assignment.
//!
//! When a miner publishes its commitment, the aggregate signature doubles as
//! the seed for the miner's next-round position: `(sig mod N) + 1`. Because
//! any two signatures may reduce to the same value, the resolved
//! `final_order_of_next_round` assignment must be made collision-free while
//! staying deterministic for every observer.
//!
//! Collision handling: the acting miner keeps its supposed order; previously
//! assigned miners that now conflict are retargeted to the lowest free value
//! in the full range `1..=N`, in ascending public-key order. A retargeted
//! order is always strictly different from every assigned value, including
//! the collided one. Running out of free values is impossible by
//! construction (at most N assignments into N values) and is treated as a
//! defect, never a recoverable rejection.

use dposcore_crypto::{InValue, OutValue, Signature};
use dposcore_types::MinerPublicKey;
use tracing::{debug, warn};

use crate::types::Round;
use crate::validation::{ValidationError, ValidationResult};

/// Applies a miner's commitment to a working copy of the base round.
///
/// Preconditions (rejected with [`ValidationError::InvalidCommitment`] or
/// [`ValidationError::RevealValidationFailed`]):
/// - the miner holds a slot in `base`
/// - the slot's `out_value` is not yet set
/// - a non-empty `previous_in_value` opens the miner's prior-round
///   commitment
///
/// On success returns a fresh [`Round`] with the commitment recorded and
/// every `final_order_of_next_round` collision resolved. The input round is
/// never mutated.
pub fn apply_commitment(
    base: &Round,
    previous_round: Option<&Round>,
    miner: &MinerPublicKey,
    previous_in_value: Option<InValue>,
    out_value: OutValue,
    signature: Signature,
) -> ValidationResult<Round> {
    let slot = base
        .slot(miner)
        .ok_or_else(|| ValidationError::InvalidCommitment {
            miner: *miner,
            detail: "miner holds no slot in this round".into(),
        })?;

    if slot.out_value.is_some() {
        return Err(ValidationError::InvalidCommitment {
            miner: *miner,
            detail: "out value already set for this round".into(),
        });
    }

    if let Some(reveal) = &previous_in_value {
        let prior_commitment = previous_round
            .and_then(|round| round.slot(miner))
            .and_then(|slot| slot.out_value);
        match prior_commitment {
            Some(commitment) if commitment.matches(reveal) => {}
            _ => return Err(ValidationError::RevealValidationFailed { miner: *miner }),
        }
    }

    let mut working = base.clone();
    let miner_count = working.miner_count();
    let supposed_order = signature.to_order(miner_count);

    // Orders already assigned to other mined slots
    let taken: Vec<u32> = working
        .mined_slots()
        .filter(|slot| slot.public_key != *miner)
        .map(|slot| slot.final_order_of_next_round)
        .collect();

    {
        let slot = working
            .slot_mut(miner)
            .ok_or_else(|| ValidationError::InvalidCommitment {
                miner: *miner,
                detail: "miner holds no slot in this round".into(),
            })?;
        slot.out_value = Some(out_value);
        slot.signature = Some(signature);
        // First valid write wins; an existing reveal is never overwritten
        if slot.previous_in_value.is_none() {
            slot.previous_in_value = previous_in_value;
        }
        slot.supposed_order_of_next_round = supposed_order;
        slot.final_order_of_next_round = supposed_order;
    }

    if taken.contains(&supposed_order) {
        resolve_collisions(&mut working, miner, supposed_order)?;
    }

    // Exhaustive verification: the resolved assignment must be collision
    // free, and in particular the collided value must not be left occupied
    // by two slots
    if !working.final_orders_are_distinct() {
        warn!(
            miner = %miner,
            supposed_order,
            "order resolution left a duplicate assignment"
        );
        return Err(ValidationError::OrderAssignmentExhausted { miner: *miner });
    }

    debug!(
        miner = %miner,
        supposed_order,
        round = working.round_number,
        "commitment applied"
    );
    Ok(working)
}

/// Retargets every mined slot (other than `acting`) whose final order equals
/// `collided`, assigning each the lowest free value in `1..=N`.
///
/// Conflicting miners are processed in ascending public-key order, which the
/// `BTreeMap` iteration provides.
fn resolve_collisions(
    working: &mut Round,
    acting: &MinerPublicKey,
    collided: u32,
) -> ValidationResult<()> {
    let miner_count = working.miner_count();
    let conflicting: Vec<MinerPublicKey> = working
        .mined_slots()
        .filter(|slot| slot.public_key != *acting && slot.final_order_of_next_round == collided)
        .map(|slot| slot.public_key)
        .collect();

    for conflict_key in conflicting {
        // Recompute the taken set on every step so earlier retargets are
        // excluded from the free range
        let taken: Vec<u32> = working
            .mined_slots()
            .filter(|slot| slot.public_key != conflict_key)
            .map(|slot| slot.final_order_of_next_round)
            .collect();

        let free = (1..=miner_count).find(|candidate| !taken.contains(candidate));
        match free {
            Some(order) => {
                debug!(
                    miner = %conflict_key,
                    from = collided,
                    to = order,
                    "retargeting conflicting next-round order"
                );
                if let Some(slot) = working.slot_mut(&conflict_key) {
                    slot.final_order_of_next_round = order;
                }
            }
            None => {
                // Cannot happen: at most N mined slots compete for N values
                return Err(ValidationError::OrderAssignmentExhausted {
                    miner: conflict_key,
                });
            }
        }
    }
    Ok(())
}
