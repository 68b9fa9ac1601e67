//! # DPoS Core - Core Abstractions
//!
//! This crate provides the foundational traits for the DPoS Core scheduler.
//! It defines interfaces for:
//!
//! - **Storage**: Key-value backends for persisting committed round state
//! - **Collaborators**: The election and reward modules consumed through
//!   narrow interfaces at term boundaries
//!
//! # Design Philosophy
//!
//! The core crate follows these principles:
//!
//! 1. **Trait-based abstractions**: Every external collaborator is a trait,
//!    allowing different implementations to be swapped.
//!
//! 2. **Minimal dependencies**: This crate has few dependencies to avoid
//!    pulling in large libraries transitively.
//!
//! 3. **Thread safety**: All traits require `Send + Sync` for safe concurrent
//!    use.
//!
//! 4. **Synchronous I/O**: The scheduler is logically single-threaded per
//!    chain; suspension points are external to the engine, so the traits are
//!    synchronous by design.
//!
//! # Swappable Components
//!
//! | Component | Trait | Default Impl |
//! |-----------|-------|--------------|
//! | Storage | `StateBackend` | RocksDB (dposcore-storage) |
//! | Election | `ElectionProvider` | external voting module |
//! | Rewards | `RewardSink` | external treasury module |

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod traits;

// Re-export commonly used types
pub use traits::{
    // Collaborators
    ElectionError, ElectionProvider, MinedBlocksTally, NullRewardSink, RewardSink,
    // Storage
    StateBackend, StorageError, StorageResult, WriteBatch, WriteOperation,
};
