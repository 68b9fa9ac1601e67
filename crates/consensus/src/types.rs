//! Consensus-specific types for the DPoS round scheduler.
//!
//! This module defines the core data structures of the scheduler:
//! - [`Round`] - one complete cycle through all miners' slots
//! - [`MinerSlot`] - one miner's per-round schedule and commitment state
//! - [`MinerListSnapshot`] - the miner set adopted for a term
//! - [`ConsensusBehaviour`] - the single legal action for a caller
//! - [`SignedProposal`] - the wire structure miners submit
//!
//! A committed [`Round`] is immutable: every state transition constructs a
//! fresh `Round` value and commits it atomically. Working copies are always
//! clones; the committed snapshot is never mutated in place.

use std::collections::BTreeMap;

use dposcore_crypto::{Hasher, InValue, OutValue, Signature};
use dposcore_types::{MinerPublicKey, Timestamp, H256};
use serde::{Deserialize, Serialize};

/// Round numbers are monotonic and start at 1.
pub type RoundNumber = u64;

/// Term numbers are monotonic and start at 1.
pub type TermNumber = u64;

/// The single legal consensus action for a miner at a point in time.
///
/// Evaluated by the behaviour state machine against `(round, now)`; carried
/// on proposals as the behaviour tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConsensusBehaviour {
    /// No action available.
    #[default]
    Nothing,
    /// Publish this round's commitment (a normal block).
    UpdateValue,
    /// Produce a filler block inside the current slot.
    TinyBlock,
    /// Terminate the round as the extra block producer.
    NextRound,
    /// Terminate the term as the extra block producer at a term boundary.
    NextTerm,
}

impl std::fmt::Display for ConsensusBehaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusBehaviour::Nothing => write!(f, "Nothing"),
            ConsensusBehaviour::UpdateValue => write!(f, "UpdateValue"),
            ConsensusBehaviour::TinyBlock => write!(f, "TinyBlock"),
            ConsensusBehaviour::NextRound => write!(f, "NextRound"),
            ConsensusBehaviour::NextTerm => write!(f, "NextTerm"),
        }
    }
}

/// One miner's schedule and commitment state within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerSlot {
    /// The miner this slot belongs to.
    pub public_key: MinerPublicKey,

    /// Position in the round's schedule, `1..=N`, unique within the round.
    pub order: u32,

    /// Scheduled start of this miner's time slot.
    pub expected_mining_time: Timestamp,

    /// Times the miner actually produced blocks this round (append-only).
    pub actual_mining_times: Vec<Timestamp>,

    /// Blocks produced so far in the current term (normal and tiny).
    pub produced_blocks: u64,

    /// Filler blocks produced inside the current round, bounded by the
    /// configured per-slot cap.
    pub produced_tiny_blocks: u64,

    /// Slots the miner let elapse without producing, cumulative over the
    /// current term.
    pub missed_time_slots: u64,

    /// This round's commitment, set at most once per round.
    pub out_value: Option<OutValue>,

    /// Aggregate signature published together with `out_value`; seeds the
    /// next round's mining order.
    pub signature: Option<Signature>,

    /// Reveal of the prior round's secret; `None` is the empty sentinel for
    /// miners with no prior-round commitment.
    pub previous_in_value: Option<InValue>,

    /// Order derived directly from the signature, before collision
    /// resolution. Zero until the miner mines.
    pub supposed_order_of_next_round: u32,

    /// Resolved next-round order. Zero until the miner mines; the non-zero
    /// values across a round's mined slots are pairwise distinct.
    pub final_order_of_next_round: u32,

    /// The block height this miner considers irreversible.
    pub implied_irreversible_block_height: u64,

    /// Whether this miner is designated to terminate the round.
    pub is_extra_block_producer: bool,
}

impl MinerSlot {
    /// Creates an empty slot at the given order and scheduled time.
    pub fn new(public_key: MinerPublicKey, order: u32, expected_mining_time: Timestamp) -> Self {
        Self {
            public_key,
            order,
            expected_mining_time,
            actual_mining_times: Vec::new(),
            produced_blocks: 0,
            produced_tiny_blocks: 0,
            missed_time_slots: 0,
            out_value: None,
            signature: None,
            previous_in_value: None,
            supposed_order_of_next_round: 0,
            final_order_of_next_round: 0,
            implied_irreversible_block_height: 0,
            is_extra_block_producer: false,
        }
    }

    /// True once the miner has published its commitment this round.
    #[inline]
    pub fn has_mined(&self) -> bool {
        self.out_value.is_some()
    }

    /// The chronologically latest actual mining time, if any.
    pub fn latest_actual_mining_time(&self) -> Option<Timestamp> {
        self.actual_mining_times.iter().copied().max()
    }

    /// Whether `now` falls inside this slot's window
    /// `[expected, expected + interval)`.
    pub fn is_in_time_slot(&self, now: Timestamp, interval_ms: u64) -> bool {
        now >= self.expected_mining_time
            && now < self.expected_mining_time.saturating_add_millis(interval_ms)
    }
}

/// One complete cycle through all miners' slots.
///
/// Immutable once committed; the engine constructs a fresh `Round` for every
/// transition and never mutates a committed value in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round {
    /// Monotonic round number, starting at 1.
    pub round_number: RoundNumber,

    /// The term this round belongs to.
    pub term_number: TermNumber,

    /// Per-miner slots, keyed by public key. `BTreeMap` keeps iteration and
    /// structural hashing deterministic.
    pub miners: BTreeMap<MinerPublicKey, MinerSlot>,

    /// Highest block height confirmed irreversible, non-decreasing across
    /// the committed history.
    pub confirmed_irreversible_height: u64,

    /// Round in which `confirmed_irreversible_height` was established,
    /// non-decreasing across the committed history.
    pub confirmed_irreversible_round_number: RoundNumber,

    /// The miner that terminated the previous round, if any.
    pub extra_block_producer_of_previous_round: Option<MinerPublicKey>,

    /// True for the first round after a term transition replaced the miner
    /// set.
    pub is_miner_list_just_changed: bool,
}

impl Round {
    /// Number of miners in this round.
    #[inline]
    pub fn miner_count(&self) -> u32 {
        self.miners.len() as u32
    }

    /// Looks up a miner's slot.
    pub fn slot(&self, key: &MinerPublicKey) -> Option<&MinerSlot> {
        self.miners.get(key)
    }

    /// Looks up a miner's slot mutably. Only meaningful on working copies;
    /// committed rounds are never mutated.
    pub fn slot_mut(&mut self, key: &MinerPublicKey) -> Option<&mut MinerSlot> {
        self.miners.get_mut(key)
    }

    /// Whether the key holds a slot in this round.
    pub fn is_slot_holder(&self, key: &MinerPublicKey) -> bool {
        self.miners.contains_key(key)
    }

    /// Slots sorted by schedule order.
    pub fn slots_by_order(&self) -> Vec<&MinerSlot> {
        let mut slots: Vec<&MinerSlot> = self.miners.values().collect();
        slots.sort_by_key(|slot| slot.order);
        slots
    }

    /// The slot at a given order, if any.
    pub fn slot_by_order(&self, order: u32) -> Option<&MinerSlot> {
        self.miners.values().find(|slot| slot.order == order)
    }

    /// The slot scheduled last (highest order).
    pub fn final_slot(&self) -> Option<&MinerSlot> {
        self.miners.values().max_by_key(|slot| slot.order)
    }

    /// The designated extra block producer of this round.
    pub fn extra_block_producer(&self) -> Option<&MinerSlot> {
        self.miners.values().find(|slot| slot.is_extra_block_producer)
    }

    /// Scheduled start of the round (earliest expected mining time).
    pub fn start_time(&self) -> Option<Timestamp> {
        self.miners
            .values()
            .map(|slot| slot.expected_mining_time)
            .min()
    }

    /// Start of the extra block slot: the moment the final ordinary slot's
    /// window has fully elapsed.
    pub fn extra_block_slot_start(&self, interval_ms: u64) -> Option<Timestamp> {
        self.final_slot()
            .map(|slot| slot.expected_mining_time.saturating_add_millis(interval_ms))
    }

    /// Slots whose miner has published a commitment this round.
    pub fn mined_slots(&self) -> impl Iterator<Item = &MinerSlot> {
        self.miners.values().filter(|slot| slot.has_mined())
    }

    /// Number of miners that have mined this round.
    pub fn mined_miner_count(&self) -> u32 {
        self.mined_slots().count() as u32
    }

    /// Whether the schedule orders form a permutation of `1..=N`.
    pub fn orders_form_permutation(&self) -> bool {
        let count = self.miner_count();
        let mut seen = vec![false; count as usize];
        for slot in self.miners.values() {
            if slot.order < 1 || slot.order > count {
                return false;
            }
            let index = (slot.order - 1) as usize;
            if seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }

    /// Whether the next-round orders of mined slots are pairwise distinct
    /// scalar values within `1..=N`.
    pub fn final_orders_are_distinct(&self) -> bool {
        let count = self.miner_count();
        let mut seen = Vec::new();
        for slot in self.mined_slots() {
            let order = slot.final_order_of_next_round;
            if order < 1 || order > count || seen.contains(&order) {
                return false;
            }
            seen.push(order);
        }
        true
    }

    /// Structural hash of the round, covering every field with security or
    /// privilege significance.
    ///
    /// Two rounds are interchangeable for consensus purposes exactly when
    /// their round ids are equal; the post-execution consistency check
    /// compares the intended round's id against the committed one's.
    pub fn round_id(&self) -> H256 {
        let mut hasher = Hasher::new();
        hasher.update(&self.round_number.to_be_bytes());
        hasher.update(&self.term_number.to_be_bytes());
        hasher.update(&self.confirmed_irreversible_height.to_be_bytes());
        hasher.update(&self.confirmed_irreversible_round_number.to_be_bytes());
        match &self.extra_block_producer_of_previous_round {
            Some(key) => {
                hasher.update(&[1]);
                hasher.update(key.as_bytes());
            }
            None => hasher.update(&[0]),
        }
        hasher.update(&[self.is_miner_list_just_changed as u8]);

        // BTreeMap iteration is key-ordered, so the encoding is canonical
        for (key, slot) in &self.miners {
            hasher.update(key.as_bytes());
            hasher.update(&slot.order.to_be_bytes());
            hasher.update(&slot.expected_mining_time.as_millis().to_be_bytes());
            hasher.update(&(slot.actual_mining_times.len() as u64).to_be_bytes());
            for time in &slot.actual_mining_times {
                hasher.update(&time.as_millis().to_be_bytes());
            }
            hasher.update(&slot.produced_blocks.to_be_bytes());
            hasher.update(&slot.produced_tiny_blocks.to_be_bytes());
            hasher.update(&slot.missed_time_slots.to_be_bytes());
            match &slot.out_value {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(value.as_bytes());
                }
                None => hasher.update(&[0]),
            }
            match &slot.signature {
                Some(signature) => {
                    hasher.update(&[1]);
                    hasher.update(signature.as_bytes());
                }
                None => hasher.update(&[0]),
            }
            match &slot.previous_in_value {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(value.as_bytes());
                }
                None => hasher.update(&[0]),
            }
            hasher.update(&slot.supposed_order_of_next_round.to_be_bytes());
            hasher.update(&slot.final_order_of_next_round.to_be_bytes());
            hasher.update(&slot.implied_irreversible_block_height.to_be_bytes());
            hasher.update(&[slot.is_extra_block_producer as u8]);
        }

        H256::new(hasher.finalize())
    }
}

/// The miner set adopted for one term.
///
/// Produced from the election collaborator's output at term boundaries and
/// persisted alongside the first round of the term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerListSnapshot {
    /// The term this snapshot covers.
    pub term_number: TermNumber,

    /// First round of the term, used to locate the term boundary.
    pub start_round_number: RoundNumber,

    /// The elected miners, in election order.
    pub miners: Vec<MinerPublicKey>,
}

/// Payload of an `UpdateValue` proposal: the caller's commitment for this
/// round plus the reveal of its own prior-round secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateValuePayload {
    /// Commitment to this round's secret.
    pub out_value: OutValue,

    /// Aggregate signature seeding the next-round order.
    pub signature: Signature,

    /// Reveal of the prior round's secret (`None` for miners with no
    /// prior-round commitment).
    pub previous_in_value: Option<InValue>,

    /// The caller's implied irreversible block height.
    pub implied_irreversible_block_height: u64,

    /// When the caller produced the block.
    pub actual_mining_time: Timestamp,
}

/// Payload of a `TinyBlock` proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TinyBlockPayload {
    /// When the caller produced the filler block.
    pub actual_mining_time: Timestamp,
}

/// Payload of a `NextRound`/`NextTerm` proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTransitionPayload {
    /// The freshly generated round the proposer wants adopted.
    pub next_round: Round,

    /// Reconstructed `(miner, revealed_value)` pairs for miners that did not
    /// reveal on their own; validated against prior-round commitments before
    /// any write.
    pub reveals: Vec<(MinerPublicKey, InValue)>,

    /// When the terminating block was produced.
    pub actual_mining_time: Timestamp,
}

/// Behaviour-specific proposal content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalPayload {
    /// Commitment publication.
    UpdateValue(UpdateValuePayload),
    /// Filler block.
    TinyBlock(TinyBlockPayload),
    /// Round or term termination.
    RoundTransition(RoundTransitionPayload),
}

/// A signed consensus proposal submitted by a miner.
///
/// Signature verification happens upstream; the scheduler validates the
/// proposal's semantics against the committed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    /// The committed round this proposal is based on.
    pub round_number: RoundNumber,

    /// The term of the base round.
    pub term_number: TermNumber,

    /// The proposing miner.
    pub public_key: MinerPublicKey,

    /// The action the proposal claims to perform.
    pub behaviour: ConsensusBehaviour,

    /// Behaviour-specific content.
    pub payload: ProposalPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tag: u8) -> MinerPublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[32] = tag;
        MinerPublicKey::new(bytes)
    }

    fn three_miner_round() -> Round {
        let mut round = Round {
            round_number: 2,
            term_number: 1,
            ..Default::default()
        };
        for (i, tag) in [1u8, 2, 3].iter().enumerate() {
            let slot = MinerSlot::new(
                key(*tag),
                (i + 1) as u32,
                Timestamp::from_millis(10_000 + 4_000 * i as u64),
            );
            round.miners.insert(slot.public_key, slot);
        }
        round
    }

    #[test]
    fn orders_form_permutation_detects_duplicates() {
        let mut round = three_miner_round();
        assert!(round.orders_form_permutation());

        round.slot_mut(&key(3)).unwrap().order = 1;
        assert!(!round.orders_form_permutation());
    }

    #[test]
    fn final_orders_ignore_unmined_slots() {
        let mut round = three_miner_round();
        // No one mined: vacuously distinct
        assert!(round.final_orders_are_distinct());

        let in_value = InValue::random();
        let slot = round.slot_mut(&key(1)).unwrap();
        slot.out_value = Some(OutValue::commit(&in_value));
        slot.final_order_of_next_round = 2;
        assert!(round.final_orders_are_distinct());

        let in_value = InValue::random();
        let slot = round.slot_mut(&key(2)).unwrap();
        slot.out_value = Some(OutValue::commit(&in_value));
        slot.final_order_of_next_round = 2;
        assert!(!round.final_orders_are_distinct());
    }

    #[test]
    fn round_id_covers_irreversibility_fields() {
        let round = three_miner_round();
        let mut tweaked = round.clone();
        tweaked.confirmed_irreversible_height = 5;
        assert_ne!(round.round_id(), tweaked.round_id());
    }

    #[test]
    fn round_id_covers_extra_block_producer_designation() {
        let round = three_miner_round();
        let mut tweaked = round.clone();
        tweaked.slot_mut(&key(2)).unwrap().is_extra_block_producer = true;
        assert_ne!(round.round_id(), tweaked.round_id());
    }

    #[test]
    fn round_id_is_stable_across_clones() {
        let round = three_miner_round();
        assert_eq!(round.round_id(), round.clone().round_id());
    }

    #[test]
    fn extra_block_slot_start_follows_final_slot() {
        let round = three_miner_round();
        assert_eq!(
            round.extra_block_slot_start(4_000),
            Some(Timestamp::from_millis(10_000 + 4_000 * 2 + 4_000))
        );
    }

    #[test]
    fn slot_window_is_half_open() {
        let slot = MinerSlot::new(key(1), 1, Timestamp::from_millis(10_000));
        assert!(!slot.is_in_time_slot(Timestamp::from_millis(9_999), 4_000));
        assert!(slot.is_in_time_slot(Timestamp::from_millis(10_000), 4_000));
        assert!(slot.is_in_time_slot(Timestamp::from_millis(13_999), 4_000));
        assert!(!slot.is_in_time_slot(Timestamp::from_millis(14_000), 4_000));
    }
}
