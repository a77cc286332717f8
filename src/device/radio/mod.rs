//! Half-duplex transceiver driven by the MAC.

pub mod types;
use core::fmt::Debug;

use crate::mac::frame::Frame;
use types::*;

/// Physical-layer radio driven by the MAC.
///
/// Both commands are asynchronous: the call only starts the operation and the
/// host later dispatches [`Event::RadioSwitched`](crate::mac::types::Event::RadioSwitched)
/// or [`Event::TxComplete`](crate::mac::types::Event::TxComplete). The MAC never
/// issues a new state change before the previous one was confirmed.
pub trait Radio: Sized {
    /// Failure reported by the implementation.
    #[cfg(feature = "defmt")]
    type Error: Debug + defmt::Format;

    /// Failure reported by the implementation.
    #[cfg(not(feature = "defmt"))]
    type Error: Debug;

    /// Start switching the transceiver to `state`.
    fn set_state(&mut self, state: RadioState) -> Result<(), Self::Error>;

    /// Start sending `frame`. Only called once the radio confirmed `Tx`.
    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error>;

    /// Clear-channel assessment: is the medium free right now?
    fn is_channel_idle(&mut self) -> Result<bool, Self::Error>;
}
