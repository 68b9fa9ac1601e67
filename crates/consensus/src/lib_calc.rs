//! Last Irreversible Block computation.
//!
//! Each miner that mines in a round carries an
//! `implied_irreversible_block_height` claim in its *previous* round slot.
//! Aggregating those claims yields the height that a Byzantine-safe quorum
//! of the full miner set has confirmed.
//!
//! With `N` the total miner count of the round, the calculation tolerates
//! `f = (N - 1) / 3` Byzantine miners and requires `N - f` confirmations.
//! Crucially, the confirmation index is computed against `N`, never against
//! the number of miners that happened to report - fewer reporters must never
//! produce a premature LIB.

use tracing::debug;

use crate::types::Round;

/// Computes the BFT-safe irreversible height for a finished round.
///
/// `current` is the round whose participation is being aggregated; the
/// implied height claims are read from `previous`, the round in which they
/// were published. Returns `None` when fewer than the minimum-consent count
/// of miners reported, or when no height reaches the required confirmation
/// count.
pub fn compute_lib(current: &Round, previous: &Round) -> Option<u64> {
    let total = current.miner_count() as usize;
    if total == 0 {
        return None;
    }

    let byzantine_tolerance = (total - 1) / 3;
    let required_confirmations = total - byzantine_tolerance;
    let minimum_consent = 2 * total / 3 + 1;

    // Claims of every miner that mined in the current round, read from the
    // previous round's slots; a zero claim is "no report"
    let mut heights: Vec<u64> = current
        .mined_slots()
        .filter_map(|slot| previous.slot(&slot.public_key))
        .map(|slot| slot.implied_irreversible_block_height)
        .filter(|height| *height > 0)
        .collect();

    if heights.len() < minimum_consent || heights.len() < required_confirmations {
        debug!(
            round = current.round_number,
            reporters = heights.len(),
            minimum_consent,
            "not enough implied-height reports for a LIB update"
        );
        return None;
    }

    heights.sort_unstable();

    // heights[i] is confirmed by the heights.len() - i reporters at or above
    // it; the smallest index giving required_confirmations confirmations is
    // measured against the total set, not the reporter count
    let index = heights.len() - required_confirmations;
    let lib = heights[index];

    debug!(
        round = current.round_number,
        reporters = heights.len(),
        required_confirmations,
        lib,
        "computed irreversible height"
    );
    Some(lib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MinerSlot;
    use dposcore_crypto::{InValue, OutValue};
    use dposcore_types::{MinerPublicKey, Timestamp};

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
                Timestamp::from_millis(4_000 * i as u64),
            );
            round.miners.insert(slot.public_key, slot);
        }
        round
    }

    /// `implied[i]` is miner i+1's claim in the previous round; `mined`
    /// lists the miners that produced in the current round.
    fn setup(count: u8, implied: &[u64], mined: &[u8]) -> (Round, Round) {
        let mut previous = round_with_miners(9, count);
        for (i, height) in implied.iter().enumerate() {
            previous
                .slot_mut(&key(i as u8 + 1))
                .unwrap()
                .implied_irreversible_block_height = *height;
        }
        let mut current = round_with_miners(10, count);
        for tag in mined {
            current.slot_mut(&key(*tag)).unwrap().out_value =
                Some(OutValue::commit(&InValue::random()));
        }
        (current, previous)
    }

    #[test]
    fn exactly_minimum_consent_gives_bft_sound_lib() {
        // N=7: f=2, required confirmations 5, minimum consent 5
        let (current, previous) = setup(
            7,
            &[100, 90, 95, 110, 105, 0, 0],
            &[1, 2, 3, 4, 5],
        );
        // Sorted claims: [90, 95, 100, 105, 110]; index 5 - 5 = 0
        // The LIB must be confirmed by all five reporters (= N - f), so it
        // is the lowest claim
        assert_eq!(compute_lib(&current, &previous), Some(90));
    }

    #[test]
    fn below_minimum_consent_gives_no_update() {
        // Only 4 of 7 report
        let (current, previous) = setup(7, &[100, 90, 95, 110, 0, 0, 0], &[1, 2, 3, 4]);
        assert_eq!(compute_lib(&current, &previous), None);
    }

    #[test]
    fn extra_reporters_raise_the_lib() {
        // N=7, all seven report: index 7 - 5 = 2 -> third-lowest claim
        let (current, previous) = setup(
            7,
            &[100, 90, 95, 110, 105, 120, 85],
            &[1, 2, 3, 4, 5, 6, 7],
        );
        // Sorted: [85, 90, 95, 100, 105, 110, 120] -> heights[2] = 95,
        // confirmed by exactly 5 reporters
        assert_eq!(compute_lib(&current, &previous), Some(95));
    }

    #[test]
    fn zero_claims_are_not_reports() {
        // Five miners mined, but one of them never published a claim: the
        // reporter count is 4, below minimum consent
        let (current, previous) = setup(7, &[100, 90, 95, 110, 0, 0, 0], &[1, 2, 3, 4, 5]);
        assert_eq!(compute_lib(&current, &previous), None);
    }

    #[test]
    fn miners_absent_from_previous_round_do_not_report() {
        let (current, mut previous) = setup(7, &[100, 90, 95, 110, 105, 0, 0], &[1, 2, 3, 4, 5]);
        // Miner 5's claim exists but it held no slot in the previous round
        previous.miners.remove(&key(5));
        assert_eq!(compute_lib(&current, &previous), None);
    }

    #[test]
    fn small_set_uses_total_count_not_reporters() {
        // N=4: f=1, required 3, minimum consent 3
        let (current, previous) = setup(4, &[50, 60, 70, 0], &[1, 2, 3]);
        // Sorted [50, 60, 70]; index 3 - 3 = 0 -> 50 confirmed by 3 = N - f
        assert_eq!(compute_lib(&current, &previous), Some(50));
    }
}
