//! Traits for the election and reward collaborators.
//!
//! The scheduler consumes the validator-election module and produces events
//! for the reward/treasury module. Both are reached only through the narrow
//! interfaces defined here; neither collaborator ever mutates round or term
//! state directly.

use dposcore_types::MinerPublicKey;
use thiserror::Error;

/// Errors surfaced by an election provider.
#[derive(Error, Debug)]
pub enum ElectionError {
    /// The election result is empty or otherwise unusable.
    #[error("no elected miners available: {0}")]
    NoElectedMiners(String),

    /// The provider could not be reached.
    #[error("election provider unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the ordered candidate list at term boundaries.
///
/// The scheduler calls this exactly once per term transition and adopts the
/// returned list verbatim as the new term's miner set - no filtering or
/// reordering happens here beyond the deterministic order-assignment engine.
pub trait ElectionProvider: Send + Sync {
    /// Returns the elected miners for the next term, in election order.
    fn elected_miners(&self) -> Result<Vec<MinerPublicKey>, ElectionError>;
}

/// Per-miner production tally reported at term completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedBlocksTally {
    /// The miner the tally belongs to.
    pub miner: MinerPublicKey,
    /// Blocks the miner produced during the term (normal and tiny).
    pub blocks_produced: u64,
}

/// Receives "blocks mined" events for reward distribution.
///
/// The sink only observes completed work; it cannot influence scheduling
/// decisions.
pub trait RewardSink: Send + Sync {
    /// Called when a term completes with the per-miner production tallies.
    fn on_term_completed(&self, term_number: u64, tallies: &[MinedBlocksTally]);
}

/// A reward sink that discards every event.
///
/// Useful for tests and for deployments that wire rewards elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRewardSink;

impl RewardSink for NullRewardSink {
    fn on_term_completed(&self, _term_number: u64, _tallies: &[MinedBlocksTally]) {}
}
