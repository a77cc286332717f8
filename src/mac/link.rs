//! Serialization of radio commands.
//!
//! The transceiver accepts one state change at a time. A request made while
//! a switch is still in flight is remembered and issued once the radio
//! confirms; a request for the state the radio already settled in is dropped.

use crate::device::radio::types::RadioState;
use crate::mac::types::{Effect, Effects};
use crate::mac::Error;

/// Radio state as requested, confirmed and still to be issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    confirmed: Option<RadioState>,
    pending: Option<RadioState>,
    deferred: Option<RadioState>,
    tx_in_flight: bool,
}

impl Link {
    /// A link that has not issued anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for the radio to end up in `target`.
    pub fn request(&mut self, target: RadioState, effects: &mut Effects) -> Result<(), Error> {
        match self.pending {
            Some(pending) => {
                self.deferred = (pending != target).then_some(target);
                Ok(())
            }
            None if self.confirmed == Some(target) => {
                self.deferred = None;
                Ok(())
            }
            None => self.issue(target, effects),
        }
    }

    /// The radio confirmed a switch to `state`.
    pub fn switched(&mut self, state: RadioState, effects: &mut Effects) -> Result<(), Error> {
        if self.pending != Some(state) {
            return Err(Error::UnexpectedRadioCompletion(state));
        }
        self.pending = None;
        self.confirmed = Some(state);
        match self.deferred.take() {
            Some(next) if next != state => self.issue(next, effects),
            _ => Ok(()),
        }
    }

    /// Has the radio settled in `state` with nothing left to issue?
    pub fn is_settled(&self, state: RadioState) -> bool {
        self.confirmed == Some(state) && self.pending.is_none() && self.deferred.is_none()
    }

    /// Last state the radio confirmed.
    pub fn radio_state(&self) -> Option<RadioState> {
        self.confirmed
    }

    /// A frame was handed to the radio.
    pub fn transmit_started(&mut self) {
        self.tx_in_flight = true;
    }

    /// Returns whether a transmission was actually in flight.
    pub fn transmit_finished(&mut self) -> bool {
        core::mem::replace(&mut self.tx_in_flight, false)
    }

    fn issue(&mut self, target: RadioState, effects: &mut Effects) -> Result<(), Error> {
        trace!("radio -> {}", target);
        effects
            .push(Effect::SetRadio(target))
            .map_err(|_| Error::EffectsFull)?;
        self.pending = Some(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elides_switch_to_current_state() {
        let mut link = Link::new();
        let mut effects = Effects::new();
        link.request(RadioState::Rx, &mut effects).unwrap();
        link.switched(RadioState::Rx, &mut effects).unwrap();
        link.request(RadioState::Rx, &mut effects).unwrap();
        assert_eq!(effects.as_slice(), &[Effect::SetRadio(RadioState::Rx)]);
        assert!(link.is_settled(RadioState::Rx));
    }

    #[test]
    fn defers_while_switching() {
        let mut link = Link::new();
        let mut effects = Effects::new();
        link.request(RadioState::Sleep, &mut effects).unwrap();
        link.request(RadioState::Rx, &mut effects).unwrap();
        link.request(RadioState::Tx, &mut effects).unwrap();
        // only the first command went out, the latest request waits
        assert_eq!(effects.as_slice(), &[Effect::SetRadio(RadioState::Sleep)]);
        assert!(!link.is_settled(RadioState::Tx));

        effects.clear();
        link.switched(RadioState::Sleep, &mut effects).unwrap();
        assert_eq!(effects.as_slice(), &[Effect::SetRadio(RadioState::Tx)]);
        assert!(!link.is_settled(RadioState::Sleep));

        effects.clear();
        link.switched(RadioState::Tx, &mut effects).unwrap();
        assert!(effects.is_empty());
        assert!(link.is_settled(RadioState::Tx));
    }

    #[test]
    fn request_back_to_pending_target_cancels_deferral() {
        let mut link = Link::new();
        let mut effects = Effects::new();
        link.request(RadioState::Sleep, &mut effects).unwrap();
        link.request(RadioState::Rx, &mut effects).unwrap();
        link.request(RadioState::Sleep, &mut effects).unwrap();
        effects.clear();
        link.switched(RadioState::Sleep, &mut effects).unwrap();
        assert!(effects.is_empty());
        assert!(link.is_settled(RadioState::Sleep));
    }

    #[test]
    fn unexpected_completion_is_an_error() {
        let mut link = Link::new();
        let mut effects = Effects::new();
        assert_eq!(
            link.switched(RadioState::Rx, &mut effects),
            Err(Error::UnexpectedRadioCompletion(RadioState::Rx))
        );
        link.request(RadioState::Rx, &mut effects).unwrap();
        assert_eq!(
            link.switched(RadioState::Tx, &mut effects),
            Err(Error::UnexpectedRadioCompletion(RadioState::Tx))
        );
    }

    #[test]
    fn tracks_transmissions() {
        let mut link = Link::new();
        assert!(!link.transmit_finished());
        link.transmit_started();
        assert!(link.transmit_finished());
        assert!(!link.transmit_finished());
    }
}
