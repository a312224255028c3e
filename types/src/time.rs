//! Timestamp type and the injectable clock.
//!
//! Timestamps are Unix epoch seconds (UTC). Slot arithmetic assumes node
//! clocks are NTP-disciplined; the chain database only ever reads time
//! through a [`Clock`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }

    pub fn plus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Round down to a multiple of `interval_secs`.
    pub fn align_down(self, interval_secs: u64) -> Self {
        if interval_secs == 0 {
            return self;
        }
        Self(self.0 - self.0 % interval_secs)
    }

    pub fn is_aligned(&self, interval_secs: u64) -> bool {
        interval_secs != 0 && self.0 % interval_secs == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of wall-clock time for expiration and slot-window checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
