//! Round construction.
//!
//! Rounds are generated in three situations:
//!
//! - **Genesis / term start**: a fresh miner set is seeded into a schedule
//!   by hashing each key with the term number, so the initial order is
//!   deterministic but not simply the election order.
//! - **Same-term transition**: the next round's schedule comes from the
//!   commit-reveal order assignment - miners that mined keep their resolved
//!   `final_order_of_next_round`, silent miners fill the remaining orders in
//!   ascending key order and accrue a missed slot.
//! - **Term transition**: the election collaborator's output replaces the
//!   miner set wholesale and is seeded like a genesis round.
//!
//! All construction is pure: callers pass the committed base round and get a
//! fresh [`Round`] value back.

use std::collections::BTreeMap;

use dposcore_config::ConsensusConfig;
use dposcore_crypto::keccak256_concat;
use dposcore_types::{MinerPublicKey, Timestamp};
use tracing::{debug, info};

use crate::lib_calc::compute_lib;
use crate::types::{MinerSlot, Round, RoundNumber, TermNumber};

/// Deterministic schedule orders for a fresh miner set.
///
/// Each key is ranked by `keccak256(term_number || public_key)`; ties are
/// impossible because keys are distinct. The result maps every miner to an
/// order in `1..=N`.
fn seeded_orders(
    miners: &[MinerPublicKey],
    term_number: TermNumber,
) -> BTreeMap<MinerPublicKey, u32> {
    let mut ranked: Vec<(MinerPublicKey, [u8; 32])> = miners
        .iter()
        .map(|key| {
            (
                *key,
                keccak256_concat(&[&term_number.to_be_bytes(), key.as_bytes()]),
            )
        })
        .collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(index, (key, _))| (key, (index + 1) as u32))
        .collect()
}

/// Generates the first round of a term from an elected miner list.
///
/// Used at genesis and after every term transition. The slot at order 1 is
/// designated to terminate the round, since no signature exists yet to seed
/// the designation.
pub fn generate_first_round(
    miners: &[MinerPublicKey],
    term_number: TermNumber,
    round_number: RoundNumber,
    start_time: Timestamp,
    config: &ConsensusConfig,
) -> Round {
    let orders = seeded_orders(miners, term_number);
    let mut round = Round {
        round_number,
        term_number,
        is_miner_list_just_changed: true,
        ..Default::default()
    };

    for (key, order) in orders {
        let expected = start_time
            .saturating_add_millis(config.mining_interval_ms * (order as u64 - 1));
        let mut slot = MinerSlot::new(key, order, expected);
        slot.is_extra_block_producer = order == 1;
        round.miners.insert(key, slot);
    }

    info!(
        round = round_number,
        term = term_number,
        miners = round.miner_count(),
        "generated first round of term"
    );
    round
}

/// The deterministic next-round order for every miner of `base`.
///
/// Miners that mined keep their resolved `final_order_of_next_round`;
/// everyone else fills the remaining free orders in ascending public-key
/// order. Validation uses the same map to reject transitions whose orders
/// deviate from the assignment engine.
pub fn next_round_order_map(base: &Round) -> BTreeMap<MinerPublicKey, u32> {
    let miner_count = base.miner_count();
    let mut orders: BTreeMap<MinerPublicKey, u32> = base
        .mined_slots()
        .map(|slot| (slot.public_key, slot.final_order_of_next_round))
        .collect();

    let mut taken: Vec<u32> = orders.values().copied().collect();
    for (key, slot) in &base.miners {
        if slot.has_mined() {
            continue;
        }
        // BTreeMap iteration gives ascending key order
        if let Some(free) = (1..=miner_count).find(|candidate| !taken.contains(candidate)) {
            taken.push(free);
            orders.insert(*key, free);
        }
    }
    orders
}

/// Generates the successor of `base` within the same term.
///
/// `terminator` is the extra block producer closing the round at
/// `current_time`. The new schedule starts one mining interval after the
/// terminating block; the extra-block designation of the new round derives
/// from the terminator's aggregate signature.
pub fn generate_next_round(
    base: &Round,
    previous_round: Option<&Round>,
    terminator: &MinerPublicKey,
    current_time: Timestamp,
    config: &ConsensusConfig,
) -> Round {
    let orders = next_round_order_map(base);
    let round_start = current_time.saturating_add_millis(config.mining_interval_ms);
    let miner_count = base.miner_count();

    let mut round = Round {
        round_number: base.round_number + 1,
        term_number: base.term_number,
        confirmed_irreversible_height: base.confirmed_irreversible_height,
        confirmed_irreversible_round_number: base.confirmed_irreversible_round_number,
        extra_block_producer_of_previous_round: Some(*terminator),
        is_miner_list_just_changed: false,
        ..Default::default()
    };

    for (key, order) in orders {
        let expected = round_start
            .saturating_add_millis(config.mining_interval_ms * (order as u64 - 1));
        let mut slot = MinerSlot::new(key, order, expected);
        if let Some(base_slot) = base.slot(&key) {
            slot.produced_blocks = base_slot.produced_blocks;
            slot.missed_time_slots = if base_slot.has_mined() {
                base_slot.missed_time_slots
            } else {
                base_slot.missed_time_slots + 1
            };
        }
        round.miners.insert(key, slot);
    }

    // The terminator's signature seeds the next extra block designation
    let designated_order = base
        .slot(terminator)
        .and_then(|slot| slot.signature)
        .map(|signature| signature.to_order(miner_count))
        .unwrap_or(1);
    designate_extra_block_producer(&mut round, designated_order);

    apply_lib_advance(&mut round, base, previous_round);

    debug!(
        round = round.round_number,
        term = round.term_number,
        "generated next round"
    );
    round
}

/// Generates the first round of the next term from the election output.
pub fn generate_next_term_round(
    elected: &[MinerPublicKey],
    base: &Round,
    previous_round: Option<&Round>,
    terminator: &MinerPublicKey,
    current_time: Timestamp,
    config: &ConsensusConfig,
) -> Round {
    let mut round = generate_first_round(
        elected,
        base.term_number + 1,
        base.round_number + 1,
        current_time.saturating_add_millis(config.mining_interval_ms),
        config,
    );
    round.confirmed_irreversible_height = base.confirmed_irreversible_height;
    round.confirmed_irreversible_round_number = base.confirmed_irreversible_round_number;
    round.extra_block_producer_of_previous_round = Some(*terminator);
    apply_lib_advance(&mut round, base, previous_round);

    info!(
        round = round.round_number,
        term = round.term_number,
        miners = round.miner_count(),
        "generated first round of next term"
    );
    round
}

fn designate_extra_block_producer(round: &mut Round, order: u32) {
    for slot in round.miners.values_mut() {
        slot.is_extra_block_producer = slot.order == order;
    }
    // Orders form a permutation, so exactly one slot matched; fall back to
    // order 1 if the designation was out of range
    if round.extra_block_producer().is_none() {
        for slot in round.miners.values_mut() {
            slot.is_extra_block_producer = slot.order == 1;
        }
    }
}

fn apply_lib_advance(next: &mut Round, base: &Round, previous_round: Option<&Round>) {
    if let Some(previous) = previous_round {
        if let Some(height) = compute_lib(base, previous) {
            if height > next.confirmed_irreversible_height {
                next.confirmed_irreversible_height = height;
                next.confirmed_irreversible_round_number = base.round_number;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dposcore_crypto::{InValue, OutValue, Signature};

    fn key(tag: u8) -> MinerPublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[32] = tag;
        MinerPublicKey::new(bytes)
    }

    fn keys(count: u8) -> Vec<MinerPublicKey> {
        (1..=count).map(key).collect()
    }

    fn config() -> ConsensusConfig {
        ConsensusConfig::default()
    }

    fn mine(round: &mut Round, tag: u8, final_order: u32, sig_value: u8) {
        let mut sig = [0u8; 64];
        sig[63] = sig_value;
        let slot = round.slot_mut(&key(tag)).unwrap();
        slot.out_value = Some(OutValue::commit(&InValue::random()));
        slot.signature = Some(Signature::new(sig));
        slot.supposed_order_of_next_round = final_order;
        slot.final_order_of_next_round = final_order;
    }

    #[test]
    fn first_round_is_a_permutation_with_even_spacing() {
        let round = generate_first_round(&keys(5), 1, 1, Timestamp::from_millis(10_000), &config());
        assert!(round.orders_form_permutation());
        assert!(round.is_miner_list_just_changed);

        let slots = round.slots_by_order();
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(
                slot.expected_mining_time,
                Timestamp::from_millis(10_000 + 4_000 * i as u64)
            );
        }
        assert_eq!(round.extra_block_producer().unwrap().order, 1);
    }

    #[test]
    fn first_round_order_is_seeded_and_deterministic() {
        let orders_for_term = |term: u64| -> Vec<u32> {
            let round = generate_first_round(&keys(7), term, 1, Timestamp::ZERO, &config());
            keys(7).iter().map(|k| round.slot(k).unwrap().order).collect()
        };

        // Same seed, same schedule
        assert_eq!(orders_for_term(1), orders_for_term(1));

        // Different term seeds reshuffle the schedule (checked across many
        // terms so the assertion does not hinge on one hash outcome)
        let reference = orders_for_term(1);
        assert!((2..=20).any(|term| orders_for_term(term) != reference));
    }

    #[test]
    fn next_round_keeps_resolved_orders_and_fills_gaps() {
        let mut base = generate_first_round(&keys(4), 1, 5, Timestamp::from_millis(0), &config());
        mine(&mut base, 1, 3, 0);
        mine(&mut base, 2, 1, 0);

        let map = next_round_order_map(&base);
        assert_eq!(map[&key(1)], 3);
        assert_eq!(map[&key(2)], 1);
        // Silent miners fill the free orders (2, 4) in ascending key order
        assert_eq!(map[&key(3)], 2);
        assert_eq!(map[&key(4)], 4);
    }

    #[test]
    fn next_round_increments_missed_slots_for_silent_miners() {
        let mut base = generate_first_round(&keys(3), 1, 5, Timestamp::from_millis(0), &config());
        mine(&mut base, 1, 2, 0);

        let next = generate_next_round(&base, None, &key(1), Timestamp::from_millis(60_000), &config());
        assert_eq!(next.slot(&key(1)).unwrap().missed_time_slots, 0);
        assert_eq!(next.slot(&key(2)).unwrap().missed_time_slots, 1);
        assert_eq!(next.slot(&key(3)).unwrap().missed_time_slots, 1);
    }

    #[test]
    fn next_round_schedule_follows_terminating_time() {
        let mut base = generate_first_round(&keys(3), 1, 5, Timestamp::from_millis(0), &config());
        mine(&mut base, 1, 1, 0);

        let next = generate_next_round(&base, None, &key(1), Timestamp::from_millis(100_000), &config());
        assert_eq!(next.round_number, 6);
        assert_eq!(next.term_number, 1);
        assert_eq!(
            next.start_time(),
            Some(Timestamp::from_millis(104_000))
        );
        assert!(next.orders_form_permutation());
        assert_eq!(
            next.extra_block_producer_of_previous_round,
            Some(key(1))
        );
    }

    #[test]
    fn extra_block_designation_derives_from_terminator_signature() {
        let mut base = generate_first_round(&keys(5), 1, 5, Timestamp::from_millis(0), &config());
        // signature value 1 -> order 2 for N=5
        mine(&mut base, 2, 4, 1);

        let next = generate_next_round(&base, None, &key(2), Timestamp::from_millis(60_000), &config());
        assert_eq!(next.extra_block_producer().unwrap().order, 2);
    }

    #[test]
    fn fresh_slots_carry_no_commitments() {
        let mut base = generate_first_round(&keys(3), 1, 5, Timestamp::from_millis(0), &config());
        mine(&mut base, 1, 1, 0);

        let next = generate_next_round(&base, None, &key(1), Timestamp::from_millis(60_000), &config());
        for slot in next.miners.values() {
            assert!(slot.out_value.is_none());
            assert!(slot.signature.is_none());
            assert!(slot.previous_in_value.is_none());
            assert!(slot.actual_mining_times.is_empty());
            assert_eq!(slot.final_order_of_next_round, 0);
        }
    }

    #[test]
    fn term_round_replaces_the_miner_set() {
        let mut base = generate_first_round(&keys(3), 1, 10, Timestamp::from_millis(0), &config());
        mine(&mut base, 1, 1, 0);

        let elected: Vec<MinerPublicKey> = (10..13).map(key).collect();
        let next = generate_next_term_round(
            &elected,
            &base,
            None,
            &key(1),
            Timestamp::from_millis(90_000),
            &config(),
        );

        assert_eq!(next.round_number, 11);
        assert_eq!(next.term_number, 2);
        assert!(next.is_miner_list_just_changed);
        for k in &elected {
            assert!(next.is_slot_holder(k));
        }
        assert!(!next.is_slot_holder(&key(1)));
        assert_eq!(next.extra_block_producer_of_previous_round, Some(key(1)));
    }
}
