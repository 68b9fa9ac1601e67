//! Core traits for the DPoS Core scheduler.
//!
//! This module defines abstract traits that allow different implementations
//! to be swapped in for storage and for the election/reward collaborators.
//!
//! # Usage
//!
//! Other crates depend on these traits rather than concrete implementations,
//! enabling flexibility and testability.
//!
//! ```ignore
//! use dposcore_core::traits::{StateBackend, ElectionProvider};
//!
//! // Use trait bounds instead of concrete types
//! fn start_term<S: StateBackend, E: ElectionProvider>(
//!     storage: &S,
//!     election: &E,
//! ) {
//!     // Implementation works with any backend
//! }
//! ```

mod collaborators;
mod storage;

pub use collaborators::*;
pub use storage::*;
