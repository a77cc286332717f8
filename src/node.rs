//! A [`Mac`] bound to its [`Device`].

use crate::device::payload::Payload;
use crate::device::radio::types::Address;
use crate::device::radio::Radio;
use crate::device::timer::Timer;
use crate::device::upper::UpperLayer;
use crate::device::{Device, Error as DeviceError};
use crate::mac::config::Config;
use crate::mac::types::{Effect, Event};
use crate::mac::Mac;
use crate::Error;

/// One sensor node: dispatches events into the state machine and carries the
/// resulting effects out on the collaborators, one event at a time.
pub struct Node<D: Device> {
    mac: Mac,
    device: D,
}

impl<D: Device> Node<D> {
    /// Validate `config` and bind a fresh state machine to `device`.
    pub fn new(config: Config, address: Address, device: D) -> Result<Self, Error<D>> {
        let mac = Mac::new(config, address)?;
        Ok(Self { mac, device })
    }

    /// Bring the node up; arms its first wakeup.
    pub fn start(&mut self) -> Result<(), Error<D>> {
        self.dispatch(Event::Start)
    }

    /// Upper-layer submission of `data` for `dest`.
    pub fn submit(&mut self, dest: Address, data: &[u8]) -> Result<(), Error<D>> {
        let payload = Payload::from_slice(data).map_err(DeviceError::Payload)?;
        self.dispatch(Event::Submit { dest, payload })
    }

    /// Run `event` to completion at the timer's current time.
    pub fn dispatch(&mut self, event: Event) -> Result<(), Error<D>> {
        let now = self.device.timer().now();
        trace!("{} at {}: {}", self.mac.address(), now, event.kind());
        let effects = self.mac.handle(now, event, &mut self.device)?;
        for effect in effects {
            self.apply(effect)?;
        }
        Ok(())
    }

    fn apply(&mut self, effect: Effect) -> Result<(), Error<D>> {
        match effect {
            Effect::ArmTimer { timer, at } => {
                self.device.timer().arm(timer, at).map_err(DeviceError::Timer)?
            }
            Effect::CancelTimer(timer) => {
                self.device.timer().cancel(timer).map_err(DeviceError::Timer)?
            }
            Effect::SetRadio(state) => {
                self.device.radio().set_state(state).map_err(DeviceError::Radio)?
            }
            Effect::Transmit(frame) => {
                self.device.radio().transmit(&frame).map_err(DeviceError::Radio)?
            }
            Effect::Deliver { origin, payload } => {
                self.device.upper().deliver(origin, payload.as_ref())
            }
            Effect::NotifyDrop(reason) => self.device.upper().notify_drop(reason),
        }
        Ok(())
    }

    /// The node's state machine.
    pub fn mac(&self) -> &Mac {
        &self.mac
    }

    /// The node's collaborators.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the collaborators.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
