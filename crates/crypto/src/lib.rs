//! # DPoS Core Crypto
//!
//! Cryptographic primitives for the DPoS Core scheduler.
//!
//! This crate provides:
//! - **Keccak256 hashing** - digests for commitments and round identifiers
//! - **Commit-reveal values** - [`InValue`], [`OutValue`], and the aggregate
//!   [`Signature`] the next-round mining order is derived from
//! - **Threshold secret sharing** - Shamir split/reconstruct so peers can
//!   rebuild an absent miner's in-value from threshold shares
//!
//! ## Example
//!
//! ```rust
//! use dposcore_crypto::{InValue, OutValue};
//!
//! // Commit early, reveal later
//! let in_value = InValue::random();
//! let out_value = OutValue::commit(&in_value);
//!
//! // Anyone can verify the reveal against the commitment
//! assert!(out_value.matches(&in_value));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commitment;
pub mod hash;
pub mod secret_sharing;

// Re-export commonly used items
pub use commitment::{InValue, OutValue, Signature};
pub use hash::{keccak256, keccak256_concat, Hasher};
pub use secret_sharing::{reconstruct_secret, split_secret, SecretShare};

/// Error types for cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid hex encoding
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size value
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Threshold secret sharing parameters are unusable
    #[error("invalid sharing parameters: {0}")]
    InvalidSharingParameters(String),

    /// Not enough shares to reconstruct the secret
    #[error("insufficient shares: need {threshold}, got {provided}")]
    InsufficientShares {
        /// Minimum shares required
        threshold: usize,
        /// Shares actually provided
        provided: usize,
    },
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
