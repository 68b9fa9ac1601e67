//! # Keccak256 Hashing Utilities
//!
//! This module provides the Keccak256 hashing functions the commit-reveal
//! scheme is built on.
//!
//! ## Functions
//!
//! - `keccak256` - Hash a single byte slice
//! - `keccak256_concat` - Hash multiple byte slices concatenated
//!
//! ## Streaming Hasher
//!
//! For incremental data, such as the structural hash over a whole round,
//! use the `Hasher` struct:
//!
//! ```rust
//! use dposcore_crypto::Hasher;
//!
//! let mut hasher = Hasher::new();
//! hasher.update(b"hello");
//! hasher.update(b" world");
//! let hash = hasher.finalize();
//! ```

use sha3::{Digest, Keccak256};

/// Compute the Keccak256 hash of the input data.
///
/// This is the hash function used throughout DPoS Core for out-value
/// commitments, round identifiers, and structural hashes.
#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Keccak256 hash of multiple concatenated inputs.
///
/// This is more efficient than manually concatenating the inputs and then
/// hashing, as it avoids allocating a temporary buffer.
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// A streaming Keccak256 hasher for incremental hashing.
///
/// Use this when hashing data that is assembled field by field, like the
/// canonical encoding of a round.
#[derive(Clone)]
pub struct Hasher {
    inner: Keccak256,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a new Keccak256 hasher.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: Keccak256::new(),
        }
    }

    /// Update the hasher with additional data.
    ///
    /// This can be called multiple times to feed data incrementally.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Update the hasher with multiple data chunks.
    #[inline]
    pub fn update_many(&mut self, parts: &[&[u8]]) {
        for part in parts {
            self.inner.update(part);
        }
    }

    /// Finalize the hasher and return the hash.
    ///
    /// This consumes the hasher. To continue hashing, create a new `Hasher`.
    #[inline]
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}
