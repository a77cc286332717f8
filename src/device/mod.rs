//! Collaborators a node needs from its host: a one-shot timer, a radio, a
//! random source and the upper layer that consumes payloads.

#[cfg(test)]
pub(crate) mod mock;
pub mod payload;
pub mod radio;
pub mod rng;
pub mod timer;
pub mod upper;

use radio::Radio;
use rng::Rng;
use timer::Timer;
use upper::UpperLayer;

/// A collaborator refused a request.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<D>
where
    D: Device,
{
    /// Arming or cancelling a timer failed.
    Timer(<<D as Device>::Timer as Timer>::Error),
    /// A radio switch or transmission could not be started.
    Radio(<<D as Device>::Radio as Radio>::Error),
    /// The random source failed.
    Rng(<<D as Device>::Rng as Rng>::Error),
    /// Submitted data does not fit in a frame.
    Payload(payload::Error),
}

impl<D: Device> From<Error<D>> for crate::Error<D> {
    fn from(value: Error<D>) -> Self {
        Self::Device(value)
    }
}

/// Everything a [`Node`](crate::node::Node) drives on behalf of its MAC.
///
/// Each accessor hands out the collaborator for the duration of one effect,
/// so a host may back several of them with the same shared state.
pub trait Device {
    /// One-shot timer owned by the hosting event loop.
    type Timer: Timer;
    /// Half-duplex transceiver.
    type Radio: Radio;
    /// Random source.
    type Rng: Rng;
    /// Consumer of delivered payloads and drop notifications.
    type Upper: UpperLayer;

    /// The node's timer.
    fn timer(&mut self) -> &mut Self::Timer;
    /// The node's radio.
    fn radio(&mut self) -> &mut Self::Radio;
    /// The node's random source.
    fn rng(&mut self) -> &mut Self::Rng;
    /// The layer above the MAC.
    fn upper(&mut self) -> &mut Self::Upper;
}
