//! # DPoS Core Consensus
//!
//! Round-based mining scheduler and consensus-safety core for the DPoS Core
//! blockchain.
//!
//! Each elected miner owns one deterministic time slot per round; the next
//! round's order derives from a commit-reveal scheme seeded by aggregate
//! signatures, and irreversibility advances through a Byzantine-fault-
//! tolerant confirmation count.
//!
//! ## Features
//!
//! - **Deterministic slot schedule** per round, collision-free by
//!   construction
//! - **Commit-reveal ordering**: `out_value = hash(in_value)` published
//!   early, revealed one round later; threshold secret sharing covers
//!   miners that go silent
//! - **Behaviour state machine** deciding the single legal action for any
//!   caller at any moment
//! - **Validation pipeline** of ordered, pure checks in front of every
//!   state mutation, plus a post-execution structural-hash comparison
//! - **BFT-safe LIB**: requires `N - f` confirmations out of the *total*
//!   miner set, `f = (N - 1) / 3`
//!
//! ## Scheduler Flow
//!
//! ```text
//! Round r:
//!
//! ┌──────────────┐
//! │ UpdateValue  │  miner i in slot i: publish out_value(r), signature,
//! │   (slot i)   │  reveal in_value(r-1); next-round order assigned
//! └──────┬───────┘
//!        │ ... one slot per miner ...
//!        ▼
//! ┌──────────────┐
//! │  TinyBlock   │  committed miners fill their remaining slot time,
//! │  (optional)  │  bounded by the per-slot cap
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │  NextRound   │  extra block producer terminates the round after the
//! │  / NextTerm  │  final slot elapsed; reveals for silent miners are
//! └──────────────┘  validated and recorded; LIB recomputed
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dposcore_consensus::{ConsensusEngine, ConsensusBehaviour};
//! use dposcore_config::ConsensusConfig;
//! use dposcore_storage::MemoryBackend;
//! use dposcore_types::Timestamp;
//! use std::sync::Arc;
//!
//! let engine = ConsensusEngine::new(
//!     Arc::new(MemoryBackend::new()),
//!     ConsensusConfig::default(),
//!     election,  // impl ElectionProvider
//!     rewards,   // impl RewardSink
//! );
//!
//! engine.bootstrap(Timestamp::now())?;
//!
//! // Each miner asks what it may legally do right now
//! match engine.behaviour_for(&my_key, Timestamp::now())? {
//!     ConsensusBehaviour::UpdateValue => { /* publish commitment */ }
//!     ConsensusBehaviour::NextRound => { /* terminate the round */ }
//!     _ => {}
//! }
//! ```
//!
//! ## Safety Guarantees
//!
//! **Slot exclusivity**: no two miners ever share an order in a committed
//! round.
//!
//! **Reveal integrity**: a revealed value is written only if it hashes to
//! the prior-round commitment, on every write path.
//!
//! **Monotonic irreversibility**: the confirmed irreversible height never
//! decreases across the committed history.
//!
//! **All-or-nothing proposals**: a rejected proposal leaves committed state
//! byte-for-byte unchanged.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod behaviour;
pub mod engine;
pub mod lib_calc;
pub mod order_assignment;
pub mod reveal;
pub mod round_generation;
pub mod store;
pub mod types;
pub mod validation;

// Re-export main types at crate root for convenience
pub use behaviour::behaviour_for;
pub use engine::{ConsensusEngine, ConsensusError, ConsensusResult, ProcessOutcome};
pub use lib_calc::compute_lib;
pub use order_assignment::apply_commitment;
pub use reveal::{apply_reveals, RevealOutcome};
pub use round_generation::{
    generate_first_round, generate_next_round, generate_next_term_round, next_round_order_map,
};
pub use store::RoundStore;
pub use types::{
    ConsensusBehaviour, MinerListSnapshot, MinerSlot, ProposalPayload, Round, RoundNumber,
    RoundTransitionPayload, SignedProposal, TermNumber, TinyBlockPayload, UpdateValuePayload,
};
pub use validation::{
    pipeline_for, run_pipeline, verify_committed_round, ValidationContext, ValidationError,
    ValidationResult, Validator,
};
