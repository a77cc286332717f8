//! In-memory collaborators for unit tests.

use alloc::vec::Vec;
use core::convert::Infallible;

use rand::{rngs::StdRng, RngCore, SeedableRng};

use super::radio::types::{Address, RadioState};
use super::radio::Radio;
use super::rng::Rng;
use super::timer::Timer;
use super::upper::UpperLayer;
use super::Device;
use crate::mac::frame::Frame;
use crate::mac::types::{DropReason, TimerId};
use crate::time::Instant;

#[derive(Debug, Default)]
pub struct MockTimer {
    pub now: Instant,
    pub armed: Vec<(TimerId, Instant)>,
}

impl Timer for MockTimer {
    type Error = Infallible;

    fn now(&self) -> Instant {
        self.now
    }

    fn arm(&mut self, timer: TimerId, at: Instant) -> Result<(), Self::Error> {
        self.armed.push((timer, at));
        Ok(())
    }

    fn cancel(&mut self, timer: TimerId) -> Result<(), Self::Error> {
        self.armed.retain(|(armed, _)| *armed != timer);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockRadio {
    pub busy: bool,
    pub state: Option<RadioState>,
    pub sent: Vec<Frame>,
}

impl Radio for MockRadio {
    type Error = Infallible;

    fn set_state(&mut self, state: RadioState) -> Result<(), Self::Error> {
        self.state = Some(state);
        Ok(())
    }

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        self.sent.push(frame.clone());
        Ok(())
    }

    fn is_channel_idle(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.busy)
    }
}

#[derive(Debug)]
pub struct MockRng(pub StdRng);

impl Rng for MockRng {
    type Error = Infallible;

    fn next_u32(&mut self) -> Result<u32, Self::Error> {
        Ok(self.0.next_u32())
    }
}

#[derive(Debug, Default)]
pub struct MockUpper {
    pub delivered: Vec<(Address, Vec<u8>)>,
    pub drops: Vec<DropReason>,
}

impl UpperLayer for MockUpper {
    fn deliver(&mut self, origin: Address, payload: &[u8]) {
        self.delivered.push((origin, payload.to_vec()));
    }

    fn notify_drop(&mut self, reason: DropReason) {
        self.drops.push(reason);
    }
}

#[derive(Debug)]
pub struct MockDevice {
    pub timer: MockTimer,
    pub radio: MockRadio,
    pub rng: MockRng,
    pub upper: MockUpper,
}

impl MockDevice {
    pub fn new(seed: u64) -> Self {
        Self {
            timer: MockTimer::default(),
            radio: MockRadio::default(),
            rng: MockRng(StdRng::seed_from_u64(seed)),
            upper: MockUpper::default(),
        }
    }
}

impl Device for MockDevice {
    type Timer = MockTimer;
    type Radio = MockRadio;
    type Rng = MockRng;
    type Upper = MockUpper;

    fn timer(&mut self) -> &mut MockTimer {
        &mut self.timer
    }

    fn radio(&mut self) -> &mut MockRadio {
        &mut self.radio
    }

    fn rng(&mut self) -> &mut MockRng {
        &mut self.rng
    }

    fn upper(&mut self) -> &mut MockUpper {
        &mut self.upper
    }
}
