//! Secret-sharing reveal intake.
//!
//! When a round is terminated, the terminating proposal may carry
//! `(miner, revealed_value)` pairs reconstructed off-chain from threshold
//! shares, standing in for miners that went silent without revealing their
//! prior-round secret.
//!
//! Every pair is validated against the target miner's prior-round
//! commitment before any write: `hash(revealed_value)` must equal that
//! miner's `out_value` from the round before the base round. The check is
//! uniform - it applies no matter whose slot the reveal targets - and it
//! precedes every write path that can populate `previous_in_value`. Writes
//! are idempotent: the first valid value wins and is never overwritten, but
//! an invalid reveal can never claim a slot.

use dposcore_crypto::InValue;
use dposcore_types::MinerPublicKey;
use tracing::{debug, warn};

use crate::types::Round;

/// What happened to a batch of reveals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealOutcome {
    /// Reveals validated and written.
    pub accepted: usize,
    /// Reveals skipped because the slot already held a validated value.
    pub skipped: usize,
    /// Miners whose reveals failed validation and were discarded.
    pub rejected: Vec<MinerPublicKey>,
}

/// Applies reconstructed reveals to a working copy of the base round.
///
/// Invalid pairs are discarded, never written; the committed input round is
/// left untouched either way. Returns the updated round together with the
/// per-pair outcome.
pub fn apply_reveals(
    base: &Round,
    previous_round: Option<&Round>,
    reveals: &[(MinerPublicKey, InValue)],
) -> (Round, RevealOutcome) {
    let mut working = base.clone();
    let mut outcome = RevealOutcome::default();

    for (miner, value) in reveals {
        if !working.is_slot_holder(miner) {
            warn!(miner = %miner, "reveal targets a miner outside the round");
            outcome.rejected.push(*miner);
            continue;
        }

        // Mandatory commitment check, before any write
        let prior_commitment = previous_round
            .and_then(|round| round.slot(miner))
            .and_then(|slot| slot.out_value);
        let valid = match prior_commitment {
            Some(commitment) => commitment.matches(value),
            None => false,
        };
        if !valid {
            warn!(miner = %miner, "reveal does not open the prior-round commitment");
            outcome.rejected.push(*miner);
            continue;
        }

        match working.slot_mut(miner) {
            Some(slot) if slot.previous_in_value.is_some() => {
                // First valid write wins
                outcome.skipped += 1;
            }
            Some(slot) => {
                slot.previous_in_value = Some(*value);
                outcome.accepted += 1;
            }
            None => {
                outcome.rejected.push(*miner);
            }
        }
    }

    debug!(
        round = base.round_number,
        accepted = outcome.accepted,
        skipped = outcome.skipped,
        rejected = outcome.rejected.len(),
        "reveal batch applied"
    );
    (working, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MinerSlot;
    use dposcore_crypto::OutValue;
    use dposcore_types::Timestamp;

    fn key(tag: u8) -> MinerPublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[32] = tag;
        MinerPublicKey::new(bytes)
    }

    fn round_with_miners(round_number: u64, count: u8) -> Round {
        let mut round = Round {
            round_number,
            term_number: 1,
            ..Default::default()
        };
        for i in 0..count {
            let slot = MinerSlot::new(
                key(i + 1),
                (i + 1) as u32,
                Timestamp::from_millis(50_000 + 4_000 * i as u64),
            );
            round.miners.insert(slot.public_key, slot);
        }
        round
    }

    #[test]
    fn valid_reveal_is_written() {
        let secret = InValue::random();
        let mut previous = round_with_miners(1, 3);
        previous.slot_mut(&key(2)).unwrap().out_value = Some(OutValue::commit(&secret));

        let base = round_with_miners(2, 3);
        let (updated, outcome) = apply_reveals(&base, Some(&previous), &[(key(2), secret)]);

        assert_eq!(outcome.accepted, 1);
        assert!(outcome.rejected.is_empty());
        assert_eq!(updated.slot(&key(2)).unwrap().previous_in_value, Some(secret));
        // The committed base stays untouched
        assert_eq!(base.slot(&key(2)).unwrap().previous_in_value, None);
    }

    #[test]
    fn crafted_reveal_is_never_written() {
        let secret = InValue::random();
        let mut previous = round_with_miners(1, 3);
        previous.slot_mut(&key(2)).unwrap().out_value = Some(OutValue::commit(&secret));

        let base = round_with_miners(2, 3);
        let crafted = InValue::random();
        let (updated, outcome) = apply_reveals(&base, Some(&previous), &[(key(2), crafted)]);

        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rejected, vec![key(2)]);
        assert_eq!(updated.slot(&key(2)).unwrap().previous_in_value, None);
    }

    #[test]
    fn reveal_without_prior_commitment_is_discarded() {
        let previous = round_with_miners(1, 3);
        let base = round_with_miners(2, 3);
        let (updated, outcome) =
            apply_reveals(&base, Some(&previous), &[(key(1), InValue::random())]);

        assert_eq!(outcome.rejected, vec![key(1)]);
        assert_eq!(updated.slot(&key(1)).unwrap().previous_in_value, None);
    }

    #[test]
    fn first_valid_write_wins() {
        let secret = InValue::random();
        let mut previous = round_with_miners(1, 3);
        previous.slot_mut(&key(3)).unwrap().out_value = Some(OutValue::commit(&secret));

        let mut base = round_with_miners(2, 3);
        let earlier = InValue::random();
        base.slot_mut(&key(3)).unwrap().previous_in_value = Some(earlier);

        let (updated, outcome) = apply_reveals(&base, Some(&previous), &[(key(3), secret)]);

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(updated.slot(&key(3)).unwrap().previous_in_value, Some(earlier));
    }

    #[test]
    fn unknown_miner_is_rejected() {
        let base = round_with_miners(2, 3);
        let (_, outcome) = apply_reveals(&base, None, &[(key(9), InValue::random())]);
        assert_eq!(outcome.rejected, vec![key(9)]);
    }

    #[test]
    fn mixed_batch_applies_only_valid_pairs() {
        let secret_a = InValue::random();
        let secret_b = InValue::random();
        let mut previous = round_with_miners(1, 3);
        previous.slot_mut(&key(1)).unwrap().out_value = Some(OutValue::commit(&secret_a));
        previous.slot_mut(&key(2)).unwrap().out_value = Some(OutValue::commit(&secret_b));

        let base = round_with_miners(2, 3);
        let (updated, outcome) = apply_reveals(
            &base,
            Some(&previous),
            &[
                (key(1), secret_a),
                (key(2), InValue::random()), // crafted
                (key(3), secret_b),          // wrong target
            ],
        );

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, vec![key(2), key(3)]);
        assert_eq!(updated.slot(&key(1)).unwrap().previous_in_value, Some(secret_a));
        assert_eq!(updated.slot(&key(2)).unwrap().previous_in_value, None);
        assert_eq!(updated.slot(&key(3)).unwrap().previous_in_value, None);
    }
}
