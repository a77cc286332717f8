//! Upper-layer (application / network) side of the MAC.

use crate::device::radio::types::Address;
use crate::mac::types::DropReason;

/// Receives what the MAC hands upward. Submissions travel the other way as
/// [`Event::Submit`](crate::mac::types::Event::Submit).
pub trait UpperLayer {
    /// A data frame addressed to this node arrived; `origin` is the node that
    /// first submitted the payload.
    fn deliver(&mut self, origin: Address, payload: &[u8]);

    /// A payload was dropped before it could be acknowledged.
    fn notify_drop(&mut self, reason: DropReason);
}
