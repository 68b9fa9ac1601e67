//! 33-byte compressed miner public key.
//!
//! This module provides the [`MinerPublicKey`] type, which identifies a miner
//! throughout the scheduler. It supports:
//!
//! - Hex encoding/decoding with `0x` prefix
//! - Serde serialization as hex strings
//! - Total ordering, so keys can index `BTreeMap`s deterministically

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Size of a compressed public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 33;

/// A 33-byte compressed public key identifying a miner.
///
/// Keys are displayed as 66 hex characters with a `0x` prefix. The scheduler
/// treats keys as opaque identifiers: signature verification happens before
/// proposals reach this crate.
///
/// # Example
///
/// ```rust
/// use dposcore_types::MinerPublicKey;
///
/// let key: MinerPublicKey =
///     "0x02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc"
///         .parse()
///         .unwrap();
///
/// // Get raw bytes
/// let bytes: [u8; 33] = key.into();
/// assert_eq!(bytes[0], 0x02);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerPublicKey([u8; PUBLIC_KEY_SIZE]);

impl MinerPublicKey {
    /// Creates a new key from a 33-byte array.
    #[inline]
    pub const fn new(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a slice.
    ///
    /// Returns an error if the slice length is not exactly 33 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != PUBLIC_KEY_SIZE {
            return Err(Error::InvalidLength {
                expected: PUBLIC_KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Returns the key as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key as a fixed-size byte array.
    #[inline]
    pub const fn as_fixed_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Creates a key from its hex representation.
    ///
    /// The input can optionally have a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let s = s.strip_prefix("0X").unwrap_or(s);

        if s.len() != PUBLIC_KEY_SIZE * 2 {
            return Err(Error::InvalidLength {
                expected: PUBLIC_KEY_SIZE * 2,
                actual: s.len(),
            });
        }

        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    /// Returns the hex representation with 0x prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for MinerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinerPublicKey({})", self)
    }
}

impl fmt::Display for MinerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated form for logs: 0x-prefix, first four and last four bytes
        let hex = hex::encode(self.0);
        write!(f, "0x{}..{}", &hex[..8], &hex[hex.len() - 8..])
    }
}

impl FromStr for MinerPublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; PUBLIC_KEY_SIZE]> for MinerPublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<MinerPublicKey> for [u8; PUBLIC_KEY_SIZE] {
    fn from(key: MinerPublicKey) -> Self {
        key.0
    }
}

impl AsRef<[u8]> for MinerPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for MinerPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MinerPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> MinerPublicKey {
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes[0] = 0x02;
        bytes[32] = 0x7f;
        MinerPublicKey::new(bytes)
    }

    #[test]
    fn hex_roundtrip() {
        let key = sample_key();
        let parsed: MinerPublicKey = key.to_hex().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(MinerPublicKey::from_slice(&[0u8; 32]).is_err());
        assert!(MinerPublicKey::from_slice(&[0u8; 34]).is_err());
    }

    #[test]
    fn display_is_abbreviated() {
        let shown = format!("{}", sample_key());
        assert!(shown.starts_with("0x0200"));
        assert!(shown.contains(".."));
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let mut a = [0u8; PUBLIC_KEY_SIZE];
        let mut b = [0u8; PUBLIC_KEY_SIZE];
        a[0] = 1;
        b[0] = 2;
        assert!(MinerPublicKey::new(a) < MinerPublicKey::new(b));
    }
}
