//! Commit-reveal value types.
//!
//! Each round, a miner publishes `out_value = keccak256(in_value)` early and
//! reveals `in_value` one round later, proving the commitment was not
//! tampered with. The aggregate [`Signature`] published alongside the
//! commitment seeds the pseudo-random mining order of the next round.

use crate::{keccak256, CryptoError, CryptoResult};
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Size of an in/out value in bytes
pub const VALUE_SIZE: usize = 32;

/// Size of an aggregate signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// A miner's secret in-value for one round.
///
/// Generated randomly at commitment time and revealed in the following
/// round. Until revealed, only the miner (and, via threshold shares, a
/// quorum of its peers) knows it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InValue([u8; VALUE_SIZE]);

/// The public commitment to an [`InValue`].
///
/// `out_value = keccak256(in_value)`; publishing it binds the miner to the
/// secret without disclosing it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutValue([u8; VALUE_SIZE]);

impl InValue {
    /// Creates an in-value from a 32-byte array.
    #[inline]
    pub const fn new(bytes: [u8; VALUE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random in-value.
    pub fn random() -> Self {
        let mut bytes = [0u8; VALUE_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates an in-value from a slice.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != VALUE_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: VALUE_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; VALUE_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl OutValue {
    /// Creates an out-value from a 32-byte array.
    #[inline]
    pub const fn new(bytes: [u8; VALUE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Computes the commitment to an in-value.
    pub fn commit(in_value: &InValue) -> Self {
        Self(keccak256(in_value.as_bytes()))
    }

    /// Checks whether `reveal` opens this commitment.
    pub fn matches(&self, reveal: &InValue) -> bool {
        keccak256(reveal.as_bytes()) == self.0
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An aggregate signature over a miner's previous in-value and round data.
///
/// The scheduler treats the signature as opaque bytes verified upstream;
/// here it only serves as the integer seed the next-round mining order is
/// derived from.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Creates a signature from a 64-byte array.
    #[inline]
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a signature from a slice.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: SIGNATURE_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derives a 1-based mining order from the signature.
    ///
    /// The signature bytes are interpreted as a big-endian integer and
    /// reduced modulo the miner count: `(sig mod n) + 1`, yielding a value
    /// in `1..=n`.
    pub fn to_order(&self, miner_count: u32) -> u32 {
        debug_assert!(miner_count > 0);
        let value = BigUint::from_bytes_be(&self.0);
        let modulus = BigUint::from(miner_count);
        let rem: BigUint = value % modulus;
        // rem < miner_count <= u32::MAX, so the cast below is lossless
        let digits = rem.to_u32_digits();
        let rem = digits.first().copied().unwrap_or(0);
        rem + 1
    }
}

macro_rules! impl_hex_value {
    ($name:ident, $size:expr) => {
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(0x{})"), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $size] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                let s = s.strip_prefix("0x").unwrap_or(&s);
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                if bytes.len() != $size {
                    return Err(serde::de::Error::custom(CryptoError::InvalidLength {
                        expected: $size,
                        actual: bytes.len(),
                    }));
                }
                let mut arr = [0u8; $size];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }
    };
}

impl_hex_value!(InValue, VALUE_SIZE);
impl_hex_value!(OutValue, VALUE_SIZE);
impl_hex_value!(Signature, SIGNATURE_SIZE);
