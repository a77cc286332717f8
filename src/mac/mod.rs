//! Traffic-adaptive duty-cycled MAC.
//!
//! [`Mac`] is a pure transition function over [`State`]: each call to
//! [`Mac::handle`] consumes one [`Event`] and returns the [`Effects`] the host
//! has to carry out, in order. The device is only consulted for the
//! synchronous clear-channel query and for random numbers.

pub mod config;
pub mod estimator;
pub mod frame;
pub mod link;
pub mod peer;
pub mod queue;
pub mod scheduler;
pub mod types;

use crate::device::payload::Payload;
use crate::device::radio::types::{Address, RadioState};
use crate::device::radio::Radio;
use crate::device::rng::Rng;
use crate::device::{Device, Error as DeviceError};
use crate::time::{Duration, Instant};

use config::Config;
use estimator::{Estimate, Estimator, Outcome};
use frame::{DataFrame, Frame};
use link::Link;
use peer::{PeerRecord, PeerTable};
use queue::{OutboundQueue, QueueEntry};
use scheduler::Scheduler;
use types::*;

/// Protocol faults. Each one means a timer was not cancelled, a collaborator
/// misbehaved or the host dispatched an event the protocol cannot accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// `event` has no transition out of `state`.
    #[allow(missing_docs)]
    UnexpectedEvent { state: State, event: EventKind },
    /// A timer fired that is not the one currently armed.
    StaleTimer(TimerId),
    /// The radio confirmed a switch that was never requested.
    UnexpectedRadioCompletion(RadioState),
    /// The radio reported a finished transmission that was never started.
    UnexpectedTxComplete,
    /// One transition produced more than [`MAX_EFFECTS`] effects.
    EffectsFull,
    /// The outbound queue was empty where a head entry was required.
    EmptyQueue,
    /// An event other than [`Event::Start`] arrived before start-up.
    NotStarted,
}

impl<D> From<Error> for super::Error<D>
where
    D: Device,
{
    fn from(value: Error) -> Self {
        Self::Mac(value)
    }
}

fn emit(effects: &mut Effects, effect: Effect) -> Result<(), Error> {
    effects.push(effect).map_err(|_| Error::EffectsFull)
}

/// State machine of one node.
#[derive(Debug, Clone)]
pub struct Mac {
    config: Config,
    address: Address,
    state: State,
    armed: Option<TimerId>,
    queue: OutboundQueue,
    peers: PeerTable,
    estimator: Estimator,
    scheduler: Scheduler,
    link: Link,
    stats: Stats,
    /// Frame waiting for the radio to reach `Tx`.
    outgoing: Option<Frame>,
    cca_attempts: u8,
    tx_attempts: u8,
    /// Beacon waits that ended without a beacon since the last delivered frame.
    beacon_misses: u32,
    beacon_wait_started: Instant,
    observed_idle: Duration,
    last_wakeup: Option<Instant>,
    /// Source of the beacon being answered. An ACK must come from this node,
    /// not from the data's destination, which a relay hop never is.
    receiver: Option<Address>,
    /// Transmitter of the data frame being acknowledged.
    ack_to: Option<Address>,
}

impl Mac {
    /// State machine for the node at `address`, waiting for [`Event::Start`].
    pub fn new(config: Config, address: Address) -> Result<Self, config::Error> {
        config.validate()?;
        Ok(Self {
            queue: OutboundQueue::new(config.queue_length),
            estimator: Estimator::from_config(&config),
            scheduler: Scheduler::new(&config),
            config,
            address,
            state: State::Init,
            armed: None,
            peers: PeerTable::new(),
            link: Link::new(),
            stats: Stats::default(),
            outgoing: None,
            cca_attempts: 0,
            tx_attempts: 0,
            beacon_misses: 0,
            beacon_wait_started: Instant::ZERO,
            observed_idle: Duration::ZERO,
            last_wakeup: None,
            receiver: None,
            ack_to: None,
        })
    }

    /// Options the node runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Own link-layer address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The single timer currently armed, if any.
    pub fn armed_timer(&self) -> Option<TimerId> {
        self.armed
    }

    /// Payloads awaiting transmission.
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Estimation state of every tracked peer.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Counters since start-up.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Last radio state confirmed by the transceiver.
    pub fn radio_state(&self) -> Option<RadioState> {
        self.link.radio_state()
    }

    /// When the node last left [`State::Sleep`] on its wakeup timer.
    pub fn last_wakeup(&self) -> Option<Instant> {
        self.last_wakeup
    }

    /// Beacon misses reported in the next DATA frame.
    pub fn beacon_misses(&self) -> u32 {
        self.beacon_misses
    }

    /// Process one event at `now` and return the resulting effects.
    pub fn handle<D: Device>(
        &mut self,
        now: Instant,
        event: Event,
        device: &mut D,
    ) -> Result<Effects, crate::Error<D>> {
        let mut effects = Effects::new();
        if self.state == State::Init && !matches!(event, Event::Start) {
            return Err(Error::NotStarted.into());
        }
        match event {
            Event::Start => self.start(now, device, &mut effects)?,
            Event::Timer(timer) => self.on_timer(now, timer, device, &mut effects)?,
            Event::RadioSwitched(state) => {
                self.link.switched(state, &mut effects)?;
                self.try_transmit(&mut effects)?;
            }
            Event::TxComplete => self.on_tx_complete(now, &mut effects)?,
            Event::Received(frame) => self.on_frame(now, frame, &mut effects)?,
            Event::Submit { dest, payload } => self.on_submit(now, dest, payload, &mut effects)?,
        }
        Ok(effects)
    }

    fn start<D: Device>(
        &mut self,
        now: Instant,
        device: &mut D,
        effects: &mut Effects,
    ) -> Result<(), crate::Error<D>> {
        if self.state != State::Init {
            return Err(self.unexpected(EventKind::Start).into());
        }
        if self.config.role.receives() {
            let init = self.config.wakeup_interval_init;
            let jitter = self.config.initial_jitter.as_micros();
            for peer in self.config.peer_addresses(self.address) {
                let offset = device.rng().next_below(jitter).map_err(DeviceError::Rng)?;
                let first = now + init + Duration::from_micros(offset);
                self.peers
                    .insert(peer, PeerRecord::new(self.config.history_length, init, first));
            }
            self.draw_offset(device)?;
        }
        info!(
            "node {} up as {} tracking {} peers",
            self.address,
            self.config.role,
            self.peers.len()
        );
        self.sleep(now, false, effects)?;
        Ok(())
    }

    fn on_timer<D: Device>(
        &mut self,
        now: Instant,
        timer: TimerId,
        device: &mut D,
        effects: &mut Effects,
    ) -> Result<(), crate::Error<D>> {
        if self.armed != Some(timer) {
            return Err(Error::StaleTimer(timer).into());
        }
        self.armed = None;
        match (self.state, timer) {
            (State::Sleep, TimerId::Wakeup) => {
                if self.config.role.receives() {
                    self.draw_offset(device)?;
                }
                self.wake(now, effects)?
            }
            (State::ChannelAssess(kind), TimerId::ChannelAssess) => {
                let idle = device.radio().is_channel_idle().map_err(DeviceError::Radio)?;
                self.channel_assessed(now, kind, idle, effects)?;
            }
            (State::WaitBeacon, TimerId::BeaconTimeout) => {
                self.beacon_misses += 1;
                self.stats.beacon_misses += 1;
                debug!("no beacon, {} misses", self.beacon_misses);
                self.sleep(now, false, effects)?;
            }
            (State::WaitData, TimerId::DataTimeout) => {
                trace!("no data");
                self.end_receive_cycle(now, effects)?;
            }
            (State::WaitAck, TimerId::AckTimeout) => {
                self.stats.missed_acks += 1;
                self.attempt_failed(now, effects)?;
            }
            (_, timer) => return Err(self.unexpected(EventKind::Timer(timer)).into()),
        }
        Ok(())
    }

    /// Fresh random offset for strategies that wake on a jittered slot.
    fn draw_offset<D: Device>(&mut self, device: &mut D) -> Result<(), crate::Error<D>> {
        if let Some(bound) = self.estimator.offset_bound() {
            let offset = device.rng().next_below(bound.as_micros()).map_err(DeviceError::Rng)?;
            self.estimator.set_offset(Duration::from_micros(offset));
        }
        Ok(())
    }

    fn wake(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.stats.wakeups += 1;
        self.last_wakeup = Some(now);
        if self.config.role.receives() {
            for (_, record) in self.peers.iter_mut() {
                if record.chosen {
                    record.wakeup_count += 1;
                }
            }
            self.assess(FrameKind::Beacon, now, effects)
        } else if self.queue.is_empty() {
            self.sleep(now, false, effects)
        } else {
            self.wait_beacon(now, effects)
        }
    }

    fn channel_assessed(
        &mut self,
        now: Instant,
        kind: FrameKind,
        idle: bool,
        effects: &mut Effects,
    ) -> Result<(), Error> {
        if idle {
            return self.send(kind, effects);
        }
        self.cca_attempts += 1;
        if self.cca_attempts < self.config.max_cca_attempts {
            trace!("channel busy ({})", self.cca_attempts);
            return self.arm(TimerId::ChannelAssess, now + self.config.wait_cca, effects);
        }
        warn!("channel busy, {} not sent", kind);
        self.stats.cca_aborts += 1;
        match kind {
            FrameKind::Beacon | FrameKind::Ack => self.end_receive_cycle(now, effects),
            FrameKind::Data => self.attempt_failed(now, effects),
        }
    }

    fn send(&mut self, kind: FrameKind, effects: &mut Effects) -> Result<(), Error> {
        let src = self.address;
        let frame = match kind {
            FrameKind::Beacon => {
                let mut chosen = self.peers.chosen();
                let dest = match (chosen.next(), chosen.next()) {
                    (Some(peer), None) => peer,
                    _ => Address::BROADCAST,
                };
                self.stats.tx_beacons += 1;
                Frame::Beacon { src, dest }
            }
            FrameKind::Data => {
                let head = self.queue.front().ok_or(Error::EmptyQueue)?;
                self.stats.tx_data += 1;
                Frame::Data(DataFrame {
                    src,
                    dest: head.dest,
                    origin: head.origin,
                    payload: head.payload.clone(),
                    idle: self.observed_idle,
                    miss_count: self.beacon_misses,
                })
            }
            FrameKind::Ack => {
                let Some(dest) = self.ack_to else {
                    return Err(self.unexpected(EventKind::Timer(TimerId::ChannelAssess)));
                };
                self.stats.tx_acks += 1;
                Frame::Ack { src, dest }
            }
        };
        self.outgoing = Some(frame);
        self.set_state(State::Sending(kind));
        self.link.request(RadioState::Tx, effects)?;
        self.try_transmit(effects)
    }

    /// Hand the outgoing frame to the radio once it settled in `Tx`.
    fn try_transmit(&mut self, effects: &mut Effects) -> Result<(), Error> {
        if !matches!(self.state, State::Sending(_)) || !self.link.is_settled(RadioState::Tx) {
            return Ok(());
        }
        if let Some(frame) = self.outgoing.take() {
            emit(effects, Effect::Transmit(frame))?;
            self.link.transmit_started();
        }
        Ok(())
    }

    fn on_tx_complete(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        let State::Sending(kind) = self.state else {
            return Err(Error::UnexpectedTxComplete);
        };
        if !self.link.transmit_finished() {
            return Err(Error::UnexpectedTxComplete);
        }
        match kind {
            FrameKind::Beacon => {
                self.set_state(State::WaitData);
                self.link.request(RadioState::Rx, effects)?;
                self.arm(TimerId::DataTimeout, now + self.config.wait_data, effects)
            }
            FrameKind::Data if self.config.use_acks => {
                self.set_state(State::WaitAck);
                self.link.request(RadioState::Rx, effects)?;
                self.arm(TimerId::AckTimeout, now + self.config.wait_ack, effects)
            }
            FrameKind::Data => self.sent(now, effects),
            FrameKind::Ack => self.end_receive_cycle(now, effects),
        }
    }

    fn on_frame(&mut self, now: Instant, frame: Frame, effects: &mut Effects) -> Result<(), Error> {
        let me = self.address;
        match (self.state, frame) {
            (State::WaitBeacon, Frame::Beacon { src, dest }) if dest.accepts(me) => {
                self.stats.rx_beacons += 1;
                self.receiver = Some(src);
                self.observed_idle = now - self.beacon_wait_started;
                self.assess(FrameKind::Data, now, effects)
            }
            (State::WaitData, Frame::Data(data)) => self.on_data(now, data, effects),
            // another chosen peer answered the same beacon; the ack stays with the first
            (State::ChannelAssess(FrameKind::Ack), Frame::Data(data)) => {
                self.accept_data(now, data, effects).map(|_| ())
            }
            (State::WaitAck, Frame::Ack { src, dest })
                if dest == me && self.receiver == Some(src) =>
            {
                self.stats.received_acks += 1;
                self.sent(now, effects)
            }
            (state, frame) => {
                trace!("discarding {} from {} in {}", frame.kind(), frame.src(), state);
                Ok(())
            }
        }
    }

    fn on_data(&mut self, now: Instant, data: DataFrame, effects: &mut Effects) -> Result<(), Error> {
        let Some(src) = self.accept_data(now, data, effects)? else {
            return Ok(());
        };
        if self.peers.contains(src) {
            self.peers.set_in_service(Some(src));
        }
        if self.config.use_acks {
            self.ack_to = Some(src);
            self.assess(FrameKind::Ack, now, effects)
        } else {
            self.end_receive_cycle(now, effects)
        }
    }

    /// Deliver or relay `data` and hit-update its transmitter. Returns the
    /// transmitter, or `None` when the frame is not for this node.
    fn accept_data(
        &mut self,
        now: Instant,
        data: DataFrame,
        effects: &mut Effects,
    ) -> Result<Option<Address>, Error> {
        let DataFrame { src, dest, origin, payload, idle, miss_count } = data;
        if dest.accepts(self.address) {
            self.stats.rx_data += 1;
            emit(effects, Effect::Deliver { origin, payload })?;
        } else if self.config.role == Role::Relay && self.peers.contains(src) {
            self.stats.rx_data += 1;
            let entry = QueueEntry { payload, dest, origin, enqueued_at: now };
            if self.queue.enqueue(entry).is_ok() {
                self.stats.relayed += 1;
            } else {
                self.drop_payload(DropReason::QueueFull, effects)?;
            }
        } else {
            trace!("data from {} for {} ignored", src, dest);
            return Ok(None);
        }

        if let Some(record) = self.peers.get_mut(src) {
            self.estimator.update(record, Outcome::Hit { idle, miss_count });
            record.chosen = false;
        }
        Ok(Some(src))
    }

    fn on_submit(
        &mut self,
        now: Instant,
        dest: Address,
        payload: Payload,
        effects: &mut Effects,
    ) -> Result<(), Error> {
        if !self.config.role.sends() {
            return self.drop_payload(DropReason::NotASender, effects);
        }
        let entry = QueueEntry { payload, dest, origin: self.address, enqueued_at: now };
        if self.queue.enqueue(entry).is_err() {
            return self.drop_payload(DropReason::QueueFull, effects);
        }
        match self.state {
            State::Sleep => self.wait_beacon(now, effects),
            State::WaitBeacon => {
                // restart so the reported idle time starts at the newest data
                self.beacon_misses += 1;
                self.stats.beacon_misses += 1;
                self.wait_beacon(now, effects)
            }
            _ => Ok(()),
        }
    }

    /// The head of the queue went out: acknowledged, or sent without acks.
    fn sent(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.queue.dequeue_front().ok_or(Error::EmptyQueue)?;
        self.tx_attempts = 0;
        self.beacon_misses = 0;
        if self.config.role == Role::Relay && !self.queue.is_empty() {
            return self.wait_beacon(now, effects);
        }
        self.sleep(now, true, effects)
    }

    fn attempt_failed(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.tx_attempts += 1;
        if self.tx_attempts < self.config.max_tx_attempts {
            debug!("attempt {} failed, retrying", self.tx_attempts);
            return self.wait_beacon(now, effects);
        }
        self.queue.dequeue_front().ok_or(Error::EmptyQueue)?;
        self.tx_attempts = 0;
        self.drop_payload(DropReason::AttemptsExhausted, effects)?;
        self.sleep(now, true, effects)
    }

    fn drop_payload(&mut self, reason: DropReason, effects: &mut Effects) -> Result<(), Error> {
        warn!("payload dropped: {}", reason);
        self.stats.dropped += 1;
        emit(effects, Effect::NotifyDrop(reason))
    }

    /// Close a beacon / data / ack cycle on the receiving side.
    fn end_receive_cycle(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.scheduler.finish_cycle(&mut self.peers, &self.estimator);
        self.ack_to = None;
        self.peers.set_in_service(None);
        if self.config.role == Role::Relay && !self.queue.is_empty() {
            return self.wait_beacon(now, effects);
        }
        self.sleep(now, false, effects)
    }

    fn assess(&mut self, kind: FrameKind, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.cca_attempts = 0;
        self.set_state(State::ChannelAssess(kind));
        self.link.request(RadioState::Rx, effects)?;
        self.arm(TimerId::ChannelAssess, now + self.config.wait_cca, effects)
    }

    fn wait_beacon(&mut self, now: Instant, effects: &mut Effects) -> Result<(), Error> {
        self.set_state(State::WaitBeacon);
        self.receiver = None;
        self.beacon_wait_started = now;
        self.link.request(RadioState::Rx, effects)?;
        self.arm(TimerId::BeaconTimeout, now + self.config.wait_wb, effects)
    }

    /// Enter [`State::Sleep`] with exactly one wakeup armed. Receiving roles
    /// follow the peer schedule; a sender wakes right away when `soon` and it
    /// still has queued data, otherwise after the initial interval.
    fn sleep(&mut self, now: Instant, soon: bool, effects: &mut Effects) -> Result<(), Error> {
        self.set_state(State::Sleep);
        self.outgoing = None;
        self.receiver = None;
        self.ack_to = None;
        self.peers.set_in_service(None);
        self.link.request(RadioState::Sleep, effects)?;
        let at = if self.config.role.receives() {
            self.scheduler.plan(now, &mut self.peers, &self.estimator)
        } else if soon && !self.queue.is_empty() {
            now
        } else {
            now + self.config.wakeup_interval_init
        };
        self.arm(TimerId::Wakeup, at, effects)
    }

    /// Arm `timer`, cancelling whatever was armed before.
    fn arm(&mut self, timer: TimerId, at: Instant, effects: &mut Effects) -> Result<(), Error> {
        if let Some(previous) = self.armed.take() {
            emit(effects, Effect::CancelTimer(previous))?;
        }
        emit(effects, Effect::ArmTimer { timer, at })?;
        self.armed = Some(timer);
        Ok(())
    }

    fn set_state(&mut self, next: State) {
        trace!("{} -> {}", self.state, next);
        self.state = next;
    }

    fn unexpected(&self, event: EventKind) -> Error {
        error!("{} in {}", event, self.state);
        Error::UnexpectedEvent { state: self.state, event }
    }
}
