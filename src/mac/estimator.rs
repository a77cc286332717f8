//! Adaptive wakeup-interval estimation.
//!
//! Two adaptive update formulas share one interface: the idle-time
//! differential, and the traffic-state-register correlator which falls back
//! to the differential when the history carries no trend. A third, fixed-slot
//! strategy ignores traffic and serves as a baseline. Whatever the strategy,
//! the result is rounded to the clock granularity, never drops below the
//! configured floor, and moves the peer's expected wakeup forward by the new
//! interval.

use crate::mac::config::{Config, EstimatorKind};
use crate::mac::peer::PeerRecord;
use crate::time::{round_micros, Duration};

/// What one wake cycle observed from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Data arrived. `idle` and `miss_count` are the peer's own report.
    Hit { idle: Duration, miss_count: u32 },
    /// Nothing arrived from the peer this cycle.
    Miss,
}

impl Outcome {
    /// Did data arrive?
    pub fn is_hit(&self) -> bool {
        matches!(self, Outcome::Hit { .. })
    }
}

/// Interval-update strategy.
pub trait Estimate {
    /// Fold `outcome` into `record`, updating its interval and next wakeup.
    fn update(&self, record: &mut PeerRecord, outcome: Outcome);
}

/// Tuning shared by both strategies, derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Lowest interval.
    pub floor: Duration,
    /// Clock resolution intervals are rounded to.
    pub granularity: Duration,
    /// Ticks per growth step.
    pub step_factor: u32,
    /// Margin added after an idle-differential correction.
    pub guard: Duration,
    /// Weight of the older history half.
    pub alpha: f32,
    /// Updates a locked interval is held.
    pub lock_hold_cycles: u8,
}

impl From<&Config> for Params {
    fn from(config: &Config) -> Self {
        Self {
            floor: config.interval_floor,
            granularity: config.clock_granularity,
            step_factor: config.step_factor,
            guard: config.guard_time(),
            alpha: config.alpha,
            lock_hold_cycles: config.lock_hold_cycles,
        }
    }
}

impl Params {
    fn step_micros(&self) -> i64 {
        self.granularity.saturating_mul(self.step_factor as u64).as_micros() as i64
    }

    /// While a locked interval is pending, pin the interval to it and commit
    /// after the hold window; otherwise run `adjust`.
    fn hold_or(&self, record: &mut PeerRecord, adjust: impl FnOnce(&mut PeerRecord)) {
        match record.locked_interval {
            Some(locked) => {
                record.interval = locked;
                record.lock_age = record.lock_age.saturating_add(1);
                if record.lock_age >= self.lock_hold_cycles {
                    record.locked_interval = None;
                    record.lock_age = 0;
                }
            }
            None => adjust(record),
        }
    }

    fn grow(&self, record: &mut PeerRecord, delta_us: i64) {
        let interval = record.interval.as_micros() as i64 + delta_us;
        record.interval = self.bounded(interval);
    }

    /// Round to the clock granularity and clamp to the floor.
    fn bounded(&self, interval_us: i64) -> Duration {
        let rounded = round_micros(interval_us, self.granularity.as_micros());
        let floor = self.floor.as_micros() as i64;
        Duration::from_micros(rounded.max(floor) as u64)
    }

    fn commit(&self, record: &mut PeerRecord) {
        record.interval = self.bounded(record.interval.as_micros() as i64);
        record.next_wakeup += record.interval;
    }

    /// Idle-differential correction. Once two idle samples are available the
    /// interval is shifted by half their difference (spread over the cycles
    /// the peer missed in between), and the next wakeup is pulled in by the
    /// newest idle time plus a guard. The shifted period becomes the locked
    /// interval. Returns whether a correction was applied.
    fn correct(&self, record: &mut PeerRecord, idle: Duration, miss_count: u32) -> bool {
        let [older, newer] = match record.idle_samples[..] {
            [older, newer] => [older, newer],
            _ => return false,
        };
        record.idle_samples.clear();

        let cycles = 2 * (miss_count as i64 + 1);
        let diff = (older.as_micros() as i64 - newer.as_micros() as i64) / cycles;
        if diff.abs() < self.granularity.as_micros() as i64 {
            return false;
        }

        let locked = self.bounded(record.interval.as_micros() as i64 + diff);
        let locked_us = locked.as_micros() as i64;
        let mut interval = locked_us - idle.as_micros() as i64 + self.guard.as_micros() as i64;
        if interval <= 0 {
            interval += locked_us;
        }
        record.interval = self.bounded(interval);
        record.locked_interval = Some(locked);
        record.lock_age = 0;
        true
    }
}

/// Strategy A: idle-time differential, fixed growth on misses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleDifferential {
    params: Params,
}

impl IdleDifferential {
    /// Strategy with the given tuning.
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Shared with the correlator's fallback path; does not commit.
    fn apply(&self, record: &mut PeerRecord, outcome: Outcome, grow_on_miss: bool) {
        let p = &self.params;
        match outcome {
            Outcome::Hit { idle, miss_count } => {
                record.push_idle(idle);
                if !p.correct(record, idle, miss_count) {
                    p.hold_or(record, |_| {});
                }
            }
            Outcome::Miss => {
                if grow_on_miss {
                    p.hold_or(record, |r| p.grow(r, p.step_micros()));
                } else {
                    p.hold_or(record, |_| {});
                }
            }
        }
    }
}

impl Estimate for IdleDifferential {
    fn update(&self, record: &mut PeerRecord, outcome: Outcome) {
        self.apply(record, outcome, true);
        self.params.commit(record);
        debug!("idle-differential: interval {}", record.interval);
    }
}

/// Strategy B: traffic-state-register correlator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlator {
    params: Params,
    fallback: IdleDifferential,
}

impl Correlator {
    /// Correlator with an idle-differential fallback.
    pub fn new(params: Params) -> Self {
        Self { params, fallback: IdleDifferential::new(params) }
    }

    /// Blended traffic weight `mu` of the record's history.
    pub fn traffic_weight(&self, record: &PeerRecord) -> f32 {
        let len = record.history.len();
        let half = len / 2;
        let x1 = half_weight(record, 0, half, len);
        let x2 = half_weight(record, half, len, len);
        self.params.alpha * x1 + (1.0 - self.params.alpha) * x2
    }
}

/// Weight of `history[start..end]`: `n0·nc0·(2/L) − n1·nc1·(2/L)`, where the
/// `nc` terms count outcomes equal to their predecessor in the ring.
fn half_weight(record: &PeerRecord, start: usize, end: usize, len: usize) -> f32 {
    let history = &record.history;
    let (mut n0, mut n1, mut nc0, mut nc1) = (0u32, 0u32, 0u32, 0u32);
    for i in start..end {
        let bit = history.get(i).unwrap_or(false);
        let repeat = i > 0 && history.get(i - 1) == Some(bit);
        if bit {
            n1 += 1;
            nc1 += repeat as u32;
        } else {
            n0 += 1;
            nc0 += repeat as u32;
        }
    }
    let scale = 2.0 / len as f32;
    (n0 * nc0) as f32 * scale - (n1 * nc1) as f32 * scale
}

impl Estimate for Correlator {
    fn update(&self, record: &mut PeerRecord, outcome: Outcome) {
        let p = &self.params;
        record.history.push(outcome.is_hit());
        let mu = self.traffic_weight(record);
        if mu > -1e-4 && mu < 1e-4 {
            self.fallback.apply(record, outcome, false);
        } else {
            // a trend overrides any half-collected idle pair
            record.idle_samples.clear();
            let delta = mu * p.step_factor as f32 * p.granularity.as_micros() as f32;
            p.hold_or(record, |r| p.grow(r, delta as i64));
        }
        p.commit(record);
        debug!("correlator: mu {} interval {}", mu, record.interval);
    }
}

/// Baseline: every update sets the interval to the slot plus the offset
/// drawn for the current cycle, regardless of the outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSlot {
    params: Params,
    slot: Duration,
    max_offset: Duration,
    offset: Duration,
}

impl FixedSlot {
    /// A baseline waking every `slot` plus up to `max_offset`.
    pub fn new(params: Params, slot: Duration, max_offset: Duration) -> Self {
        Self { params, slot, max_offset, offset: Duration::ZERO }
    }
}

impl Estimate for FixedSlot {
    fn update(&self, record: &mut PeerRecord, _outcome: Outcome) {
        record.interval = self.slot + self.offset;
        self.params.commit(record);
        debug!("fixed slot: interval {}", record.interval);
    }
}

/// Strategy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimator {
    /// See [`IdleDifferential`].
    IdleDifferential(IdleDifferential),
    /// See [`Correlator`].
    Correlator(Correlator),
    /// See [`FixedSlot`].
    FixedSlot(FixedSlot),
}

impl Estimator {
    /// Build the strategy named by `config.estimator`.
    pub fn from_config(config: &Config) -> Self {
        let params = Params::from(config);
        match config.estimator {
            EstimatorKind::IdleDifferential => Self::IdleDifferential(IdleDifferential::new(params)),
            EstimatorKind::Correlator => Self::Correlator(Correlator::new(params)),
            EstimatorKind::FixedSlot => Self::FixedSlot(FixedSlot::new(
                params,
                config.slot_duration,
                config.check_interval,
            )),
        }
    }

    /// Exclusive bound of the per-cycle random offset, if the strategy uses one.
    pub fn offset_bound(&self) -> Option<Duration> {
        match self {
            Estimator::FixedSlot(strategy) => Some(strategy.max_offset),
            _ => None,
        }
    }

    /// Set the random offset applied until the next call.
    pub fn set_offset(&mut self, offset: Duration) {
        if let Estimator::FixedSlot(strategy) = self {
            strategy.offset = offset;
        }
    }
}

impl Estimate for Estimator {
    fn update(&self, record: &mut PeerRecord, outcome: Outcome) {
        match outcome {
            Outcome::Hit { .. } => record.rx_count += 1,
            Outcome::Miss => record.miss_count += 1,
        }
        match self {
            Estimator::IdleDifferential(strategy) => strategy.update(record, outcome),
            Estimator::Correlator(strategy) => strategy.update(record, outcome),
            Estimator::FixedSlot(strategy) => strategy.update(record, outcome),
        }
    }
}
