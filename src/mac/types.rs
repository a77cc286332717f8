//! Vocabulary of the MAC state machine: roles, states, events and effects.

use heapless::Vec;

use crate::device::payload::Payload;
use crate::device::radio::types::{Address, RadioState};
use crate::mac::frame::Frame;
use crate::time::Instant;

/// Part a node plays in the network, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// Wakes on its estimated schedule and beacons for its peers.
    Receiver,
    /// Wakes when it has data and waits for a beacon.
    Sender,
    /// Receiver for its peers and sender towards its own receiver.
    Relay,
}

impl Role {
    /// Does this role run the beacon / receive cycle?
    pub fn receives(self) -> bool {
        matches!(self, Role::Receiver | Role::Relay)
    }

    /// Does this role transmit queued data?
    pub fn sends(self) -> bool {
        matches!(self, Role::Sender | Role::Relay)
    }
}

/// Frame classes exchanged during one wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum FrameKind {
    Beacon,
    Data,
    Ack,
}

/// Node-wide protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Constructed, waiting for [`Event::Start`].
    Init,
    /// Radio asleep, one wakeup timer armed.
    Sleep,
    /// Listening before sending a frame of the given kind.
    ChannelAssess(FrameKind),
    /// Switching to / transmitting a frame of the given kind.
    Sending(FrameKind),
    /// Sender side: listening for a receiver's beacon.
    WaitBeacon,
    /// Receiver side: beacon sent, listening for data.
    WaitData,
    /// Sender side: data sent, listening for the acknowledgment.
    WaitAck,
}

/// Identity of the single timer a node may have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum TimerId {
    Wakeup,
    ChannelAssess,
    BeaconTimeout,
    DataTimeout,
    AckTimeout,
}

impl TimerId {
    /// Dispatch rank among timers expiring at the same instant, lower first.
    /// The retransmission path must run before anything that touches the queue.
    pub fn priority(self) -> u8 {
        match self {
            TimerId::AckTimeout => 0,
            TimerId::DataTimeout => 1,
            TimerId::BeaconTimeout => 2,
            TimerId::ChannelAssess => 3,
            TimerId::Wakeup => 4,
        }
    }
}

/// Input to the state machine. Exactly one is processed at a time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Node bring-up, valid once in [`State::Init`].
    Start,
    /// An armed timer expired.
    Timer(TimerId),
    /// The radio finished switching to the given state.
    RadioSwitched(RadioState),
    /// The radio finished sending the last frame.
    TxComplete,
    /// A frame was received from the medium.
    Received(Frame),
    /// The upper layer hands over a payload for `dest`.
    #[allow(missing_docs)]
    Submit { dest: Address, payload: Payload },
}

/// Payload-free tag of an [`Event`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum EventKind {
    Start,
    Timer(TimerId),
    RadioSwitched(RadioState),
    TxComplete,
    Received(FrameKind),
    Submit,
}

impl Event {
    /// Tag of the event without its data.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::Timer(timer) => EventKind::Timer(*timer),
            Event::RadioSwitched(state) => EventKind::RadioSwitched(*state),
            Event::TxComplete => EventKind::TxComplete,
            Event::Received(frame) => EventKind::Received(frame.kind()),
            Event::Submit { .. } => EventKind::Submit,
        }
    }
}

/// Why a payload left the outbound queue without being acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropReason {
    /// The queue was full when the payload was submitted.
    QueueFull,
    /// Transmission attempts for the head of the queue ran out.
    AttemptsExhausted,
    /// The node's role never transmits data.
    NotASender,
}

/// Command for a collaborator, produced by one transition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Arm `timer` to fire at `at`.
    #[allow(missing_docs)]
    ArmTimer { timer: TimerId, at: Instant },
    /// Cancel the armed timer.
    CancelTimer(TimerId),
    /// Start switching the radio.
    SetRadio(RadioState),
    /// Send a frame; the radio is already in `Tx`.
    Transmit(Frame),
    /// Hand a payload to the upper layer.
    #[allow(missing_docs)]
    Deliver { origin: Address, payload: Payload },
    /// Tell the upper layer a payload was dropped.
    NotifyDrop(DropReason),
}

/// Upper bound of effects one transition can emit.
pub const MAX_EFFECTS: usize = 8;

/// Ordered effects of one transition, to be applied front to back.
pub type Effects = Vec<Effect, MAX_EFFECTS>;

/// Node counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// DATA frames transmitted.
    pub tx_data: u32,
    /// Beacons transmitted.
    pub tx_beacons: u32,
    /// Acknowledgments transmitted.
    pub tx_acks: u32,
    /// DATA frames delivered or queued for relaying.
    pub rx_data: u32,
    /// Beacons answered.
    pub rx_beacons: u32,
    /// Acknowledgments received for own DATA.
    pub received_acks: u32,
    /// Acknowledgment waits that timed out.
    pub missed_acks: u32,
    /// Payloads dropped for any [`DropReason`].
    pub dropped: u32,
    /// Foreign DATA frames queued for the next hop.
    pub relayed: u32,
    /// Scheduled wakeups taken.
    pub wakeups: u32,
    /// Beacon waits that ended without a beacon.
    pub beacon_misses: u32,
    /// Frames abandoned because the channel stayed busy.
    pub cca_aborts: u32,
}
