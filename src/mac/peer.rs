//! Per-peer traffic history and wakeup-interval state.

use alloc::collections::{BTreeMap, VecDeque};

use heapless::Vec;

use crate::device::radio::types::Address;
use crate::time::{Duration, Instant};

/// Fixed-length ring of hit (`true`) / miss (`false`) outcomes, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    bits: VecDeque<bool>,
}

impl History {
    /// A ring of `len` misses.
    pub fn new(len: usize) -> Self {
        let mut bits = VecDeque::with_capacity(len);
        bits.resize(len, false);
        Self { bits }
    }

    /// Append the newest outcome, dropping the oldest.
    pub fn push(&mut self, hit: bool) {
        if self.bits.is_empty() {
            return;
        }
        self.bits.pop_front();
        self.bits.push_back(hit);
    }

    /// Ring length, fixed at creation.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Was the ring created with length zero?
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Outcome at `index`, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    /// Outcomes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }
}

/// Estimation state of one transmitting peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub(crate) history: History,
    pub(crate) interval: Duration,
    pub(crate) locked_interval: Option<Duration>,
    /// Updates since `locked_interval` was set.
    pub(crate) lock_age: u8,
    pub(crate) next_wakeup: Instant,
    /// Up to two most recent idle times reported by the peer, oldest first.
    pub(crate) idle_samples: Vec<Duration, 2>,
    pub(crate) chosen: bool,
    pub(crate) wakeup_count: u32,
    pub(crate) miss_count: u32,
    pub(crate) rx_count: u32,
}

impl PeerRecord {
    /// Fresh record: all misses, `interval`, first expected at `next_wakeup`.
    pub fn new(history_length: usize, interval: Duration, next_wakeup: Instant) -> Self {
        Self {
            history: History::new(history_length),
            interval,
            locked_interval: None,
            lock_age: 0,
            next_wakeup,
            idle_samples: Vec::new(),
            chosen: false,
            wakeup_count: 0,
            miss_count: 0,
            rx_count: 0,
        }
    }

    /// Recent hit/miss outcomes.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current estimate of the peer's transmission interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval pinned by the last idle-differential correction.
    pub fn locked_interval(&self) -> Option<Duration> {
        self.locked_interval
    }

    /// Expected instant of the peer's next transmission.
    pub fn next_wakeup(&self) -> Instant {
        self.next_wakeup
    }

    /// Idle times reported by the peer, oldest first.
    pub fn idle_samples(&self) -> &[Duration] {
        &self.idle_samples
    }

    /// Is the peer served in the current wake cycle?
    pub fn is_chosen(&self) -> bool {
        self.chosen
    }

    /// Wakeups that served this peer.
    pub fn wakeup_count(&self) -> u32 {
        self.wakeup_count
    }

    /// Cycles that ended without data from this peer.
    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    /// DATA frames received from this peer.
    pub fn rx_count(&self) -> u32 {
        self.rx_count
    }

    /// Record an idle sample, keeping the two most recent.
    pub(crate) fn push_idle(&mut self, idle: Duration) {
        if let [_, newest] = self.idle_samples[..] {
            self.idle_samples.clear();
            let _ = self.idle_samples.push(newest);
        }
        // cannot fail, at most one slot is taken here
        let _ = self.idle_samples.push(idle);
    }
}

/// Peer records keyed by peer address, sized once at configuration time.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    records: BTreeMap<Address, PeerRecord>,
    in_service: Option<Address>,
}

impl PeerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `peer`, replacing any previous record.
    pub fn insert(&mut self, peer: Address, record: PeerRecord) {
        self.records.insert(peer, record);
    }

    /// Record of `peer`.
    pub fn get(&self, peer: Address) -> Option<&PeerRecord> {
        self.records.get(&peer)
    }

    /// Mutable record of `peer`.
    pub fn get_mut(&mut self, peer: Address) -> Option<&mut PeerRecord> {
        self.records.get_mut(&peer)
    }

    /// Is `peer` tracked?
    pub fn contains(&self, peer: Address) -> bool {
        self.records.contains_key(&peer)
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Are no peers tracked?
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &PeerRecord)> {
        self.records.iter().map(|(a, r)| (*a, r))
    }

    /// Mutable records in address order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Address, &mut PeerRecord)> {
        self.records.iter_mut().map(|(a, r)| (*a, r))
    }

    /// Peers marked for the current wake cycle.
    pub fn chosen(&self) -> impl Iterator<Item = Address> + '_ {
        self.records.iter().filter(|(_, r)| r.chosen).map(|(a, _)| *a)
    }

    /// Number of peers the pending wakeup serves.
    pub fn chosen_count(&self) -> usize {
        self.chosen().count()
    }

    /// Peer currently exchanging data with this node.
    pub fn in_service(&self) -> Option<Address> {
        self.in_service
    }

    pub(crate) fn set_in_service(&mut self, peer: Option<Address>) {
        self.in_service = peer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_its_length() {
        let mut history = History::new(4);
        assert_eq!(history.len(), 4);
        for i in 0..10 {
            history.push(i % 3 == 0);
            assert_eq!(history.len(), 4);
        }
        // 6, 7, 8, 9 -> hit, miss, miss, hit
        assert_eq!(history.iter().collect::<alloc::vec::Vec<_>>(), [true, false, false, true]);
    }

    #[test]
    fn idle_samples_keep_two_most_recent() {
        let mut record = PeerRecord::new(8, Duration::from_millis(100), Instant::ZERO);
        record.push_idle(Duration::from_millis(1));
        record.push_idle(Duration::from_millis(2));
        record.push_idle(Duration::from_millis(3));
        assert_eq!(
            record.idle_samples(),
            &[Duration::from_millis(2), Duration::from_millis(3)]
        );
    }

    #[test]
    fn chosen_iterates_marked_peers() {
        let mut table = PeerTable::new();
        for a in 1..=3 {
            table.insert(Address(a), PeerRecord::new(4, Duration::from_millis(100), Instant::ZERO));
        }
        if let Some(r) = table.get_mut(Address(2)) {
            r.chosen = true;
        }
        assert_eq!(table.chosen().collect::<alloc::vec::Vec<_>>(), [Address(2)]);
        assert_eq!(table.chosen_count(), 1);
        assert!(table.in_service().is_none());
    }
}
