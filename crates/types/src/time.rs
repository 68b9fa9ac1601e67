//! Millisecond-precision Unix timestamp.
//!
//! Mining slots are scheduled on wall-clock boundaries, so the scheduler
//! works with a dedicated [`Timestamp`] newtype rather than raw `u64`
//! millisecond counts. All arithmetic saturates: slot math near the epoch
//! origin (chain genesis) must not panic or wrap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds.
///
/// # Example
///
/// ```rust
/// use dposcore_types::Timestamp;
///
/// let start = Timestamp::from_millis(10_000);
/// let slot_end = start.saturating_add_millis(4_000);
/// assert_eq!(slot_end.millis_since(start), 4_000);
/// assert!(slot_end > start);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch origin (0 milliseconds).
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from a millisecond count.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the raw millisecond count.
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Adds a number of milliseconds, saturating at `u64::MAX`.
    #[inline]
    pub const fn saturating_add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Subtracts a number of milliseconds, saturating at zero.
    #[inline]
    pub const fn saturating_sub_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero if `earlier`
    /// is in the future.
    #[inline]
    pub const fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Adds a `Duration`, saturating at `u64::MAX`.
    pub fn saturating_add(&self, duration: Duration) -> Self {
        self.saturating_add_millis(duration.as_millis() as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
