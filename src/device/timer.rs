//! One-shot timers provided by the event scheduler that hosts the node.

use core::fmt::Debug;

use crate::mac::types::TimerId;
use crate::time::Instant;

/// Timer substrate. The MAC arms at most one timer at a time and always
/// cancels it before arming another, so an implementation may keep a single
/// slot per node. When an armed timer expires the host dispatches
/// [`Event::Timer`](crate::mac::types::Event::Timer) with the same id.
pub trait Timer: Sized {
    /// Failure reported by the implementation.
    #[cfg(feature = "defmt")]
    type Error: Debug + defmt::Format;

    /// Failure reported by the implementation.
    #[cfg(not(feature = "defmt"))]
    type Error: Debug;

    /// Current time of the hosting scheduler.
    fn now(&self) -> Instant;

    /// Arm `timer` to fire at the absolute instant `at`.
    fn arm(&mut self, timer: TimerId, at: Instant) -> Result<(), Self::Error>;

    /// Cancel `timer`; cancelling a timer that already fired is a no-op.
    fn cancel(&mut self, timer: TimerId) -> Result<(), Self::Error>;
}
