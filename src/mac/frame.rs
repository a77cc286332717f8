//! Logical frames exchanged with peers. Bit layout and checksums belong to the radio.

use crate::device::payload::Payload;
use crate::device::radio::types::Address;
use crate::mac::types::FrameKind;
use crate::time::Duration;

/// Frame handed to or received from the radio.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// Wakeup beacon: the receiver `src` is listening. `dest` is either the
    /// single expected sender or broadcast.
    #[allow(missing_docs)]
    Beacon { src: Address, dest: Address },
    /// Payload with the sender's timing report.
    Data(DataFrame),
    /// Acknowledgment from `src` of the DATA frame `dest` sent.
    #[allow(missing_docs)]
    Ack { src: Address, dest: Address },
}

impl Frame {
    /// Class of the frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Beacon { .. } => FrameKind::Beacon,
            Frame::Data(_) => FrameKind::Data,
            Frame::Ack { .. } => FrameKind::Ack,
        }
    }

    /// Transmitter of this hop.
    pub fn src(&self) -> Address {
        match self {
            Frame::Beacon { src, .. } | Frame::Ack { src, .. } => *src,
            Frame::Data(data) => data.src,
        }
    }

    /// Addressee, possibly broadcast.
    pub fn dest(&self) -> Address {
        match self {
            Frame::Beacon { dest, .. } | Frame::Ack { dest, .. } => *dest,
            Frame::Data(data) => data.dest,
        }
    }
}

/// DATA frame. Besides the payload it carries the sender's timing report,
/// which is what the receiving estimator feeds on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataFrame {
    /// Transmitting node of this hop; the peer whose schedule is estimated.
    pub src: Address,
    /// Final destination.
    pub dest: Address,
    /// Node that first submitted the payload; unchanged across relays.
    pub origin: Address,
    /// Upper-layer data.
    pub payload: Payload,
    /// How long the transmitter waited for the beacon in this cycle.
    pub idle: Duration,
    /// Beacon waits that timed out since the transmitter's last acknowledged frame.
    pub miss_count: u32,
}
