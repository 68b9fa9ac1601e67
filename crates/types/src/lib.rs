//! # DPoS Core Types
//!
//! Core type definitions for the DPoS Core mining scheduler.
//!
//! This crate provides the fundamental types used throughout DPoS Core:
//! - [`MinerPublicKey`] - 33-byte compressed public keys identifying miners
//! - [`H256`] - 32-byte hashes with Keccak256 support
//! - [`Timestamp`] - Millisecond-precision Unix timestamps
//!
//! ## Example
//!
//! ```rust
//! use dposcore_types::{MinerPublicKey, H256, Timestamp};
//!
//! // Parse a miner key from hex
//! let key: MinerPublicKey =
//!     "0x02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc"
//!         .parse()
//!         .unwrap();
//!
//! // Hash some data
//! let hash = H256::keccak256(b"hello world");
//! assert_ne!(hash, H256::NIL);
//!
//! // Millisecond timestamps with saturating arithmetic
//! let t = Timestamp::from_millis(4_000);
//! assert_eq!(t.saturating_add_millis(500).as_millis(), 4_500);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod hash;
pub mod pubkey;
pub mod time;

// Re-export main types at crate root
pub use hash::H256;
pub use pubkey::MinerPublicKey;
pub use time::Timestamp;

/// Result type alias for DPoS Core types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with DPoS Core types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}
