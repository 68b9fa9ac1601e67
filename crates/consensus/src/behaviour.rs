//! Behaviour state machine.
//!
//! Given the caller's identity, the committed round, and the wall clock,
//! exactly one consensus action is legal:
//!
//! - `UpdateValue` - the miner has not yet committed and its slot window is
//!   open
//! - `TinyBlock` - the miner already committed and has filler budget left,
//!   or it terminated the previous round and this round has not nominally
//!   started yet
//! - `NextRound` / `NextTerm` - the miner is the designated extra block
//!   producer and the final ordinary slot's window has fully elapsed;
//!   `NextTerm` replaces `NextRound` exactly at term boundaries
//! - `Nothing` - anything else
//!
//! Once a miner's `out_value` is set, `UpdateValue` is permanently
//! unavailable to it for that round.
//!
//! # Round 1
//!
//! Round 1's expected mining times derive from an arbitrary genesis
//! timestamp and are unreliable. Authorization is instead computed from the
//! *chronologically latest* actual mining time across all other slots - not
//! from the slot with the numerically highest order - counting elapsed slots
//! since the last real block.

use dposcore_config::ConsensusConfig;
use dposcore_types::{MinerPublicKey, Timestamp};
use tracing::trace;

use crate::types::{ConsensusBehaviour, Round};

/// Decides the single legal action for `caller` at `now`.
pub fn behaviour_for(
    round: &Round,
    caller: &MinerPublicKey,
    now: Timestamp,
    config: &ConsensusConfig,
    at_term_boundary: bool,
) -> ConsensusBehaviour {
    let Some(slot) = round.slot(caller) else {
        return ConsensusBehaviour::Nothing;
    };
    let interval = config.mining_interval_ms;

    // Pre-round filler window for the previous round's terminator
    if round.extra_block_producer_of_previous_round.as_ref() == Some(caller)
        && round.start_time().map(|start| now < start).unwrap_or(false)
        && slot.produced_tiny_blocks < config.tiny_blocks_per_slot
    {
        return ConsensusBehaviour::TinyBlock;
    }

    if !slot.has_mined() {
        let in_window = if round.round_number == 1 {
            round_one_slot_open(round, caller, slot.order, now, interval)
        } else {
            slot.is_in_time_slot(now, interval)
        };
        if in_window {
            return ConsensusBehaviour::UpdateValue;
        }
    } else if slot.produced_tiny_blocks < config.tiny_blocks_per_slot
        && slot.is_in_time_slot(now, interval)
    {
        return ConsensusBehaviour::TinyBlock;
    }

    if slot.is_extra_block_producer && round_has_elapsed(round, now, interval) {
        trace!(
            miner = %caller,
            round = round.round_number,
            at_term_boundary,
            "extra block producer authorized to terminate"
        );
        return if at_term_boundary {
            ConsensusBehaviour::NextTerm
        } else {
            ConsensusBehaviour::NextRound
        };
    }

    ConsensusBehaviour::Nothing
}

/// Whether every ordinary slot of the round has elapsed.
fn round_has_elapsed(round: &Round, now: Timestamp, interval: u64) -> bool {
    if round.round_number == 1 {
        // Expected times are unreliable: count remaining slots from the
        // chronologically latest real block
        match latest_actual_reference(round, None) {
            Some((reference_time, reference_order)) => {
                let remaining_slots =
                    u64::from(round.miner_count().saturating_sub(reference_order));
                now >= reference_time.saturating_add_millis(interval * (remaining_slots + 1))
            }
            None => false,
        }
    } else {
        round
            .extra_block_slot_start(interval)
            .map(|start| now >= start)
            .unwrap_or(false)
    }
}

/// Round-1 slot window for an unmined caller.
///
/// The caller with order `C` is due `C - O` slots after the reference block
/// mined at time `T` by the slot with order `O`: its window is
/// `[T + (C - O) * interval, T + (C - O + 1) * interval)`. With no reference
/// block at all, only the order-1 miner may start the chain, at any time.
fn round_one_slot_open(
    round: &Round,
    caller: &MinerPublicKey,
    caller_order: u32,
    now: Timestamp,
    interval: u64,
) -> bool {
    match latest_actual_reference(round, Some(caller)) {
        None => caller_order == 1,
        Some((reference_time, reference_order)) => {
            if caller_order <= reference_order {
                return false;
            }
            let slots_ahead = u64::from(caller_order - reference_order);
            let window_start = reference_time.saturating_add_millis(interval * slots_ahead);
            let window_end = window_start.saturating_add_millis(interval);
            now >= window_start && now < window_end
        }
    }
}

/// The chronologically latest actual mining time across the round's slots
/// (excluding `skip`, when given), together with the order of the slot that
/// produced it.
///
/// Selecting by time, not by order, matters: in round 1 the slot with the
/// numerically highest order is not necessarily the one that mined last.
fn latest_actual_reference(
    round: &Round,
    skip: Option<&MinerPublicKey>,
) -> Option<(Timestamp, u32)> {
    round
        .miners
        .values()
        .filter(|slot| Some(&slot.public_key) != skip)
        .filter_map(|slot| {
            slot.latest_actual_mining_time()
                .map(|time| (time, slot.order))
        })
        .max_by_key(|(time, _)| *time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MinerSlot;
    use dposcore_crypto::{InValue, OutValue};

    fn key(tag: u8) -> MinerPublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[32] = tag;
        MinerPublicKey::new(bytes)
    }

    fn config() -> ConsensusConfig {
        ConsensusConfig::default() // 4s interval, 8 tiny blocks
    }

    fn round_with_miners(round_number: u64, count: u8, start_ms: u64) -> Round {
        let mut round = Round {
            round_number,
            term_number: 1,
            ..Default::default()
        };
        for i in 0..count {
            let slot = MinerSlot::new(
                key(i + 1),
                (i + 1) as u32,
                Timestamp::from_millis(start_ms + 4_000 * i as u64),
            );
            round.miners.insert(slot.public_key, slot);
        }
        round
    }

    fn mark_mined(round: &mut Round, tag: u8, at_ms: u64) {
        let slot = round.slot_mut(&key(tag)).unwrap();
        slot.out_value = Some(OutValue::commit(&InValue::random()));
        slot.actual_mining_times.push(Timestamp::from_millis(at_ms));
    }

    #[test]
    fn unmined_miner_in_window_updates_value() {
        let round = round_with_miners(5, 3, 100_000);
        let behaviour = behaviour_for(
            &round,
            &key(2),
            Timestamp::from_millis(104_500),
            &config(),
            false,
        );
        assert_eq!(behaviour, ConsensusBehaviour::UpdateValue);
    }

    #[test]
    fn outside_window_is_nothing() {
        let round = round_with_miners(5, 3, 100_000);
        let behaviour = behaviour_for(
            &round,
            &key(2),
            Timestamp::from_millis(100_500), // miner 1's slot
            &config(),
            false,
        );
        assert_eq!(behaviour, ConsensusBehaviour::Nothing);
    }

    #[test]
    fn mined_miner_gets_tiny_blocks_until_cap() {
        let mut round = round_with_miners(5, 3, 100_000);
        mark_mined(&mut round, 2, 104_100);

        let now = Timestamp::from_millis(105_000);
        assert_eq!(
            behaviour_for(&round, &key(2), now, &config(), false),
            ConsensusBehaviour::TinyBlock
        );

        round.slot_mut(&key(2)).unwrap().produced_tiny_blocks =
            config().tiny_blocks_per_slot;
        assert_eq!(
            behaviour_for(&round, &key(2), now, &config(), false),
            ConsensusBehaviour::Nothing
        );
    }

    #[test]
    fn update_value_is_gone_after_mining() {
        let mut round = round_with_miners(5, 3, 100_000);
        mark_mined(&mut round, 2, 104_100);
        let behaviour = behaviour_for(
            &round,
            &key(2),
            Timestamp::from_millis(104_500),
            &config(),
            false,
        );
        assert_ne!(behaviour, ConsensusBehaviour::UpdateValue);
    }

    #[test]
    fn previous_terminator_fills_before_round_start() {
        let mut round = round_with_miners(5, 3, 100_000);
        round.extra_block_producer_of_previous_round = Some(key(3));
        let behaviour = behaviour_for(
            &round,
            &key(3),
            Timestamp::from_millis(98_000),
            &config(),
            false,
        );
        assert_eq!(behaviour, ConsensusBehaviour::TinyBlock);
    }

    #[test]
    fn extra_block_producer_terminates_after_final_slot() {
        let mut round = round_with_miners(5, 3, 100_000);
        round.slot_mut(&key(1)).unwrap().is_extra_block_producer = true;

        // Final slot (order 3) ends at 108_000 + 4_000
        let too_early = Timestamp::from_millis(111_000);
        assert_eq!(
            behaviour_for(&round, &key(1), too_early, &config(), false),
            ConsensusBehaviour::Nothing
        );

        let due = Timestamp::from_millis(112_000);
        assert_eq!(
            behaviour_for(&round, &key(1), due, &config(), false),
            ConsensusBehaviour::NextRound
        );
        assert_eq!(
            behaviour_for(&round, &key(1), due, &config(), true),
            ConsensusBehaviour::NextTerm
        );
    }

    #[test]
    fn non_designated_miner_never_terminates() {
        let mut round = round_with_miners(5, 3, 100_000);
        round.slot_mut(&key(1)).unwrap().is_extra_block_producer = true;
        assert_eq!(
            behaviour_for(&round, &key(2), Timestamp::from_millis(200_000), &config(), false),
            ConsensusBehaviour::Nothing
        );
    }

    #[test]
    fn round_one_uses_latest_actual_time_not_highest_order() {
        // Expected times are garbage (all zero offsets from genesis)
        let mut round = round_with_miners(1, 5, 0);

        // Order-5 slot mined at T1, order-1 slot mined later at T2 > T1: the
        // reference must be T2
        let t1 = 50_000;
        let t2 = 70_000;
        mark_mined(&mut round, 5, t1);
        mark_mined(&mut round, 1, t2);

        // Caller order 2 is one slot past the order-1 reference: its window
        // is [T2 + 4s, T2 + 8s)
        assert_eq!(
            behaviour_for(&round, &key(2), Timestamp::from_millis(t2 + 4_500), &config(), false),
            ConsensusBehaviour::UpdateValue
        );
        assert_eq!(
            behaviour_for(&round, &key(2), Timestamp::from_millis(t2 + 8_500), &config(), false),
            ConsensusBehaviour::Nothing
        );

        // Had the reference wrongly been the order-5 slot at T1, this time
        // would have been rejected
        assert_eq!(
            behaviour_for(&round, &key(2), Timestamp::from_millis(t2 + 4_000), &config(), false),
            ConsensusBehaviour::UpdateValue
        );
    }

    #[test]
    fn round_one_genesis_start_belongs_to_order_one() {
        let round = round_with_miners(1, 3, 0);
        let now = Timestamp::from_millis(999_999);
        assert_eq!(
            behaviour_for(&round, &key(1), now, &config(), false),
            ConsensusBehaviour::UpdateValue
        );
        assert_eq!(
            behaviour_for(&round, &key(2), now, &config(), false),
            ConsensusBehaviour::Nothing
        );
    }

    #[test]
    fn unknown_caller_gets_nothing() {
        let round = round_with_miners(5, 3, 100_000);
        assert_eq!(
            behaviour_for(&round, &key(9), Timestamp::from_millis(104_500), &config(), false),
            ConsensusBehaviour::Nothing
        );
    }
}
