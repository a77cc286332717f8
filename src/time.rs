//! Time handling in integer microseconds.
//!
//! The MAC never reads a clock of its own; every instant is handed in by the
//! caller, which keeps the protocol deterministic under simulation.

use core::ops::{Add, AddAssign, Sub};

/// Absolute point in time, in microseconds since the node's epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u64);

impl Instant {
    /// The node's epoch.
    pub const ZERO: Instant = Instant(0);

    /// Create an instant from microseconds.
    pub const fn from_micros(us: u64) -> Self {
        Instant(us)
    }

    /// Create an instant from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Instant(ms.saturating_mul(1000))
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub const fn saturating_since(self, earlier: Instant) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        self.saturating_since(rhs)
    }
}

/// Non-negative span of time, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Duration(u64);

impl Duration {
    /// Zero length.
    pub const ZERO: Duration = Duration(0);

    /// Create a duration from microseconds.
    pub const fn from_micros(us: u64) -> Self {
        Duration(us)
    }

    /// Create a duration from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Duration(ms.saturating_mul(1000))
    }

    /// Create a duration from fractional seconds, rounded to the nearest
    /// microsecond. Negative input yields zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs > 0.0 {
            Duration((secs * 1_000_000.0 + 0.5) as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Length in microseconds.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Length in fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Multiply by an integer factor, saturating.
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Duration(self.0.saturating_mul(factor))
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

/// Round a signed microsecond value to a multiple of `granularity`.
pub(crate) fn round_micros(us: i64, granularity: u64) -> i64 {
    if granularity <= 1 {
        return us;
    }
    let g = granularity as i64;
    let half = g / 2;
    if us >= 0 {
        (us + half) / g * g
    } else {
        -((-us + half) / g * g)
    }
}

#[cfg(feature = "serde")]
mod serde_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Duration {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_f64(self.as_secs_f64())
        }
    }

    impl<'de> Deserialize<'de> for Duration {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let secs = f64::deserialize(deserializer)?;
            if secs < 0.0 {
                return Err(serde::de::Error::custom("duration must not be negative"));
            }
            Ok(Duration::from_secs_f64(secs))
        }
    }
}
