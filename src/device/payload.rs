//! Bounded buffer for upper-layer data carried in DATA frames.

use heapless::Vec;

/// Maximum length of a payload managed by the MAC.
pub const PAYLOAD_SIZE: usize = 256;

/// Payload construction failure.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error {
    BufferFull,
}

/// Payload bytes owned by a queue entry or a DATA frame.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Payload {
    data: Vec<u8, PAYLOAD_SIZE>,
}

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Copy `buf` into a new payload if it fits.
    pub fn from_slice(buf: &[u8]) -> Result<Self, Error> {
        let mut payload = Self::new();
        payload.extend_from_slice(buf)?;
        Ok(payload)
    }

    /// Add data as long as it fits within the buffer.
    pub fn extend_from_slice(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.data.extend_from_slice(buf).map_err(|_| Error::BufferFull)
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Does the payload hold no bytes?
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl core::fmt::Debug for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Payload({} bytes)", self.data.len())
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<&[u8]> for Payload {
    type Error = Error;

    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(buf)
    }
}
