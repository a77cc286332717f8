//! Node configuration. Option names follow the protocol's parameter set when
//! (de)serialized; durations are given in seconds.

use alloc::vec::Vec;

use crate::device::radio::types::Address;
use crate::device::Device;
use crate::mac::types::Role;
use crate::time::Duration;

/// Interval-update formula used by the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum EstimatorKind {
    /// Traffic-state-register correlator with idle-differential fallback.
    #[default]
    Correlator,
    /// Idle-time differential only.
    IdleDifferential,
    /// Non-adaptive baseline: a fixed slot plus a random offset per cycle.
    FixedSlot,
}

/// Option that [`Config::validate`] rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error {
    ZeroClockGranularity,
    ZeroIntervalFloor,
    HistoryLength(usize),
    AlphaOutOfRange,
    ZeroQueueLength,
    ZeroTxAttempts,
    ZeroCcaAttempts,
    ZeroLockHold,
}
impl<D> From<Error> for crate::Error<D>
where
    D: Device,
{
    fn from(value: Error) -> Self {
        Self::Config(value)
    }
}

/// Recognized options of a node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Config {
    /// Part the node plays.
    pub role: Role,
    /// Interval every peer record starts with.
    pub wakeup_interval_init: Duration,
    /// Listen time before each clear-channel check.
    #[cfg_attr(feature = "serde", serde(rename = "waitCCA"))]
    pub wait_cca: Duration,
    /// How long a sender listens for a beacon.
    #[cfg_attr(feature = "serde", serde(rename = "waitWB"))]
    pub wait_wb: Duration,
    /// How long a sender listens for the acknowledgment.
    #[cfg_attr(feature = "serde", serde(rename = "waitACK"))]
    pub wait_ack: Duration,
    /// How long a receiver listens for data after its beacon.
    #[cfg_attr(feature = "serde", serde(rename = "waitDATA"))]
    pub wait_data: Duration,
    /// Resolution every interval is rounded to.
    pub clock_granularity: Duration,
    /// Clock ticks added to an interval per unit of correlator output or per miss.
    pub step_factor: u32,
    /// Blend weight between the older and the newer half of the history.
    pub alpha: f32,
    /// Length of each peer's hit/miss history; even, at least 2.
    pub history_length: usize,
    /// Peers tracked when `peers` is not given.
    pub number_of_peers: usize,
    /// Capacity of the outbound queue.
    pub queue_length: usize,
    /// Acknowledge every DATA frame.
    pub use_acks: bool,
    /// Attempts per queued payload before it is dropped.
    pub max_tx_attempts: u8,
    /// Clear-channel checks before a frame is abandoned.
    pub max_cca_attempts: u8,

    /// Interval-update strategy.
    pub estimator: EstimatorKind,
    /// Lowest interval the estimator may produce.
    pub interval_floor: Duration,
    /// Safety margin added after an idle-differential correction.
    pub guard_time: Option<Duration>,
    /// Band after the earliest pending peer wakeup served in the same cycle.
    pub convergence_window: Option<Duration>,
    /// Estimator updates a locked interval is held before it is committed.
    pub lock_hold_cycles: u8,
    /// Explicit peer addresses; defaults to the `number_of_peers` addresses
    /// following the node's own.
    pub peers: Option<Vec<Address>>,
    /// Upper bound of the random offset applied to each peer's first wakeup.
    pub initial_jitter: Duration,
    /// Miss-updates spent advancing one elapsed peer before jumping ahead.
    pub max_catch_up: u32,
    /// Base interval of the [`EstimatorKind::FixedSlot`] baseline.
    pub slot_duration: Duration,
    /// Upper bound of the random offset the baseline adds to each slot.
    pub check_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Receiver,
            wakeup_interval_init: Duration::from_millis(100),
            wait_cca: Duration::from_millis(5),
            wait_wb: Duration::from_millis(250),
            wait_ack: Duration::from_millis(10),
            wait_data: Duration::from_millis(10),
            clock_granularity: Duration::from_millis(1),
            step_factor: 75,
            alpha: 0.5,
            history_length: 8,
            number_of_peers: 1,
            queue_length: 8,
            use_acks: false,
            max_tx_attempts: 2,
            max_cca_attempts: 3,
            estimator: EstimatorKind::Correlator,
            interval_floor: Duration::from_millis(20),
            guard_time: None,
            convergence_window: None,
            lock_hold_cycles: 2,
            peers: None,
            initial_jitter: Duration::ZERO,
            max_catch_up: 64,
            slot_duration: Duration::from_millis(90),
            check_interval: Duration::from_millis(10),
        }
    }
}

impl Config {
    /// Check that every option is usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.clock_granularity == Duration::ZERO {
            return Err(Error::ZeroClockGranularity);
        }
        if self.interval_floor == Duration::ZERO {
            return Err(Error::ZeroIntervalFloor);
        }
        if self.history_length < 2 || self.history_length % 2 != 0 {
            return Err(Error::HistoryLength(self.history_length));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::AlphaOutOfRange);
        }
        if self.queue_length == 0 {
            return Err(Error::ZeroQueueLength);
        }
        if self.max_tx_attempts == 0 {
            return Err(Error::ZeroTxAttempts);
        }
        if self.max_cca_attempts == 0 {
            return Err(Error::ZeroCcaAttempts);
        }
        if self.lock_hold_cycles == 0 {
            return Err(Error::ZeroLockHold);
        }
        Ok(())
    }

    /// Growth applied per miss: `step_factor × clock_granularity`.
    pub fn step(&self) -> Duration {
        self.clock_granularity.saturating_mul(self.step_factor as u64)
    }

    /// Guard added after a correction; five clock ticks unless set.
    pub fn guard_time(&self) -> Duration {
        self.guard_time
            .unwrap_or(self.clock_granularity.saturating_mul(5))
    }

    /// Window of peers served per cycle; three `wait_cca` unless set.
    pub fn convergence_window(&self) -> Duration {
        self.convergence_window
            .unwrap_or(self.wait_cca.saturating_mul(3))
    }

    /// Peers tracked by a node at `own` address.
    pub fn peer_addresses(&self, own: Address) -> Vec<Address> {
        match &self.peers {
            Some(peers) => peers.clone(),
            None => (1..=self.number_of_peers as u16)
                .map(|i| Address(own.0.wrapping_add(i)))
                .collect(),
        }
    }
}
