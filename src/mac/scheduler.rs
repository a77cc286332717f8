//! Multi-peer wakeup scheduling: one wakeup instant per cycle, serving every
//! peer whose expected transmission falls in the convergence window.

use crate::mac::config::Config;
use crate::mac::estimator::{Estimate, Outcome};
use crate::mac::peer::PeerTable;
use crate::time::{Duration, Instant};

/// Plans one wakeup for all peers due close together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    window: Duration,
    idle_interval: Duration,
    max_catch_up: u32,
}

impl Scheduler {
    /// Scheduler using the window, idle interval and catch-up bound of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            window: config.convergence_window(),
            idle_interval: config.wakeup_interval_init,
            max_catch_up: config.max_catch_up,
        }
    }

    /// Pick the next wakeup instant and mark the peers served by it.
    ///
    /// Peers whose expected wakeup already passed are first miss-updated
    /// until it lies ahead of `now`. Every peer within the convergence window
    /// of the earliest one is chosen, and the node wakes at the latest of
    /// them so all can be caught.
    pub fn plan(
        &self,
        now: Instant,
        peers: &mut PeerTable,
        estimator: &impl Estimate,
    ) -> Instant {
        for (_, record) in peers.iter_mut() {
            record.chosen = false;
            let mut rounds = 0;
            while record.next_wakeup < now && rounds < self.max_catch_up {
                estimator.update(record, Outcome::Miss);
                rounds += 1;
            }
            if record.next_wakeup < now {
                // too far behind to replay every cycle
                let behind = (now - record.next_wakeup).as_micros();
                let interval = record.interval.as_micros().max(1);
                let cycles = behind.div_ceil(interval);
                record.next_wakeup += Duration::from_micros(cycles.saturating_mul(interval));
            }
        }

        let Some(earliest) = peers.iter().map(|(_, r)| r.next_wakeup).min() else {
            return now + self.idle_interval;
        };

        let mut at = earliest;
        for (peer, record) in peers.iter_mut() {
            if record.next_wakeup - earliest <= self.window {
                record.chosen = true;
                at = at.max(record.next_wakeup);
                trace!("peer {} chosen for {}", peer, record.next_wakeup);
            }
        }
        at.max(now)
    }

    /// Close a wake cycle: every chosen peer that was not served gets a
    /// miss-update, and no peer stays chosen.
    pub fn finish_cycle(&self, peers: &mut PeerTable, estimator: &impl Estimate) {
        for (peer, record) in peers.iter_mut() {
            if record.chosen {
                debug!("peer {} missed", peer);
                estimator.update(record, Outcome::Miss);
                record.chosen = false;
            }
        }
    }
}
