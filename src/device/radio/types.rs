/// Link-layer node address.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u16);

impl Address {
    /// Destination of frames meant for every listener.
    pub const BROADCAST: Address = Address(0xFFFF);

    /// Is this the broadcast address?
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    /// Does a frame sent to `self` concern the node at `me`?
    pub fn accepts(self, me: Address) -> bool {
        self == me || self.is_broadcast()
    }
}

impl From<u16> for Address {
    fn from(value: u16) -> Self {
        Address(value)
    }
}

/// Operating mode requested from the transceiver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Transceiver off.
    Sleep,
    /// Listening.
    Rx,
    /// Ready to send.
    Tx,
}
