//! Discrete-event harness for running several nodes on one shared medium.

#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::convert::Infallible;
use std::rc::Rc;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use tadmac::device::radio::types::{Address, RadioState};
use tadmac::device::radio::Radio;
use tadmac::device::rng::Rng;
use tadmac::device::timer::Timer;
use tadmac::device::upper::UpperLayer;
use tadmac::device::Device;
use tadmac::mac::config::Config;
use tadmac::mac::frame::Frame;
use tadmac::mac::types::{DropReason, Event, State, TimerId};
use tadmac::node::Node;
use tadmac::time::{Duration, Instant};

/// 250 kbit/s: 32 µs per byte on air.
const MICROS_PER_BYTE: u64 = 32;

fn airtime(frame: &Frame) -> Duration {
    let bytes = match frame {
        Frame::Beacon { .. } => 7,
        Frame::Ack { .. } => 11,
        Frame::Data(data) => 24 + data.payload.len() as u64,
    };
    Duration::from_micros(bytes * MICROS_PER_BYTE)
}

/// What happens to a node when a scheduled entry comes due.
#[derive(Debug, Clone)]
enum Action {
    Dispatch(Event),
    /// Timer expiry, valid only while `seq` is still the node's armed timer.
    Timer(TimerId, u64),
    /// End of a transmission: hand the frame to every listening node.
    Arrival { from: usize, frame: Frame, transmission: usize },
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: Instant,
    rank: u8,
    seq: u64,
    node: usize,
    action: Action,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // reversed: BinaryHeap pops the greatest
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.rank, other.seq).cmp(&(self.at, self.rank, self.seq))
    }
}

#[derive(Debug, Clone, Copy)]
struct Transmission {
    end: Instant,
    collided: bool,
}

/// State shared by the harness and every simulated device.
#[derive(Debug, Default)]
pub struct Medium {
    now: Instant,
    seq: u64,
    queue: BinaryHeap<Scheduled>,
    armed: Vec<Option<(TimerId, u64)>>,
    radio: Vec<RadioState>,
    transmissions: Vec<Transmission>,
    pub delivered: Vec<Vec<(Address, Vec<u8>)>>,
    pub drops: Vec<Vec<DropReason>>,
    pub frames_sent: usize,
    pub collisions: usize,
}

impl Medium {
    fn schedule(&mut self, at: Instant, rank: u8, node: usize, action: Action) -> u64 {
        self.seq += 1;
        let seq = self.seq;
        self.queue.push(Scheduled { at, rank, seq, node, action });
        seq
    }

    fn busy(&self) -> bool {
        self.transmissions.iter().any(|t| t.end > self.now)
    }
}

type Shared = Rc<RefCell<Medium>>;

#[derive(Debug)]
pub struct SimTimer {
    node: usize,
    medium: Shared,
}

impl Timer for SimTimer {
    type Error = Infallible;

    fn now(&self) -> Instant {
        self.medium.borrow().now
    }

    fn arm(&mut self, timer: TimerId, at: Instant) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        // the entry carries its own sequence number so expiry can be matched
        let seq = medium.seq + 1;
        medium.schedule(at, 1 + timer.priority(), self.node, Action::Timer(timer, seq));
        medium.armed[self.node] = Some((timer, seq));
        Ok(())
    }

    fn cancel(&mut self, timer: TimerId) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        if matches!(medium.armed[self.node], Some((armed, _)) if armed == timer) {
            medium.armed[self.node] = None;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimRadio {
    node: usize,
    medium: Shared,
}

impl Radio for SimRadio {
    type Error = Infallible;

    fn set_state(&mut self, state: RadioState) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        medium.radio[self.node] = state;
        let now = medium.now;
        medium.schedule(now, 0, self.node, Action::Dispatch(Event::RadioSwitched(state)));
        Ok(())
    }

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        let now = medium.now;
        let end = now + airtime(frame);
        let mut collided = false;
        for other in medium.transmissions.iter_mut().filter(|t| t.end > now) {
            other.collided = true;
            collided = true;
        }
        medium.transmissions.push(Transmission { end, collided });
        let transmission = medium.transmissions.len() - 1;
        medium.frames_sent += 1;
        medium.schedule(end, 0, self.node, Action::Dispatch(Event::TxComplete));
        medium.schedule(
            end,
            0,
            self.node,
            Action::Arrival { from: self.node, frame: frame.clone(), transmission },
        );
        Ok(())
    }

    fn is_channel_idle(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.medium.borrow().busy())
    }
}

#[derive(Debug)]
pub struct SimRng(StdRng);

impl Rng for SimRng {
    type Error = Infallible;

    fn next_u32(&mut self) -> Result<u32, Self::Error> {
        Ok(self.0.next_u32())
    }
}

#[derive(Debug)]
pub struct SimUpper {
    node: usize,
    medium: Shared,
}

impl UpperLayer for SimUpper {
    fn deliver(&mut self, origin: Address, payload: &[u8]) {
        self.medium.borrow_mut().delivered[self.node].push((origin, payload.to_vec()));
    }

    fn notify_drop(&mut self, reason: DropReason) {
        self.medium.borrow_mut().drops[self.node].push(reason);
    }
}

#[derive(Debug)]
pub struct SimDevice {
    timer: SimTimer,
    radio: SimRadio,
    rng: SimRng,
    upper: SimUpper,
}

impl Device for SimDevice {
    type Timer = SimTimer;
    type Radio = SimRadio;
    type Rng = SimRng;
    type Upper = SimUpper;

    fn timer(&mut self) -> &mut SimTimer {
        &mut self.timer
    }

    fn radio(&mut self) -> &mut SimRadio {
        &mut self.radio
    }

    fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    fn upper(&mut self) -> &mut SimUpper {
        &mut self.upper
    }
}

/// A set of nodes in mutual radio range.
pub struct World {
    pub medium: Shared,
    pub nodes: Vec<Node<SimDevice>>,
    seed: u64,
}

impl World {
    pub fn new(seed: u64) -> Self {
        Self { medium: Rc::new(RefCell::new(Medium::default())), nodes: Vec::new(), seed }
    }

    /// Add a node and return its index.
    pub fn add(&mut self, address: u16, config: Config) -> usize {
        let index = self.nodes.len();
        {
            let mut medium = self.medium.borrow_mut();
            medium.armed.push(None);
            medium.radio.push(RadioState::Sleep);
            medium.delivered.push(Vec::new());
            medium.drops.push(Vec::new());
        }
        let device = SimDevice {
            timer: SimTimer { node: index, medium: self.medium.clone() },
            radio: SimRadio { node: index, medium: self.medium.clone() },
            rng: SimRng(StdRng::seed_from_u64(self.seed.wrapping_add(index as u64))),
            upper: SimUpper { node: index, medium: self.medium.clone() },
        };
        let node = Node::new(config, Address(address), device).expect("valid config");
        self.nodes.push(node);
        index
    }

    pub fn now(&self) -> Instant {
        self.medium.borrow().now
    }

    pub fn start_all(&mut self) {
        for node in 0..self.nodes.len() {
            self.schedule(Instant::ZERO, node, Event::Start);
        }
    }

    pub fn schedule(&mut self, at: Instant, node: usize, event: Event) {
        self.medium.borrow_mut().schedule(at, 0, node, Action::Dispatch(event));
    }

    /// Submit `data` from `node` to `dest` at `at`.
    pub fn submit_at(&mut self, at: Instant, node: usize, dest: u16, data: &[u8]) {
        let payload = data.try_into().expect("payload fits");
        self.schedule(at, node, Event::Submit { dest: Address(dest), payload });
    }

    /// Process events until `until`, calling `check` after each dispatch.
    /// Panics on any fatal protocol error.
    pub fn run_until(&mut self, until: Instant, mut check: impl FnMut(&World, usize)) {
        loop {
            let next = {
                let mut medium = self.medium.borrow_mut();
                match medium.queue.peek() {
                    Some(entry) if entry.at <= until => medium.queue.pop(),
                    _ => None,
                }
            };
            let Some(entry) = next else { break };
            self.medium.borrow_mut().now = entry.at;

            match entry.action {
                Action::Dispatch(event) => self.dispatch(entry.node, event),
                Action::Timer(timer, seq) => {
                    let live = {
                        let mut medium = self.medium.borrow_mut();
                        let live = medium.armed[entry.node] == Some((timer, seq));
                        if live {
                            medium.armed[entry.node] = None;
                        }
                        live
                    };
                    if !live {
                        continue;
                    }
                    self.dispatch(entry.node, Event::Timer(timer));
                }
                Action::Arrival { from, frame, transmission } => {
                    let lost = {
                        let mut medium = self.medium.borrow_mut();
                        let lost = medium.transmissions[transmission].collided;
                        medium.collisions += lost as usize;
                        lost
                    };
                    if lost {
                        continue;
                    }
                    for node in 0..self.nodes.len() {
                        let listening = self.medium.borrow().radio[node] == RadioState::Rx;
                        if node != from && listening {
                            self.dispatch(node, Event::Received(frame.clone()));
                            check(self, node);
                        }
                    }
                    continue;
                }
            }
            check(self, entry.node);
        }
        self.medium.borrow_mut().now = until;
    }

    fn dispatch(&mut self, node: usize, event: Event) {
        let kind = event.kind();
        if let Err(error) = self.nodes[node].dispatch(event) {
            panic!(
                "node {} failed on {:?} at {:?}: {:?}",
                node,
                kind,
                self.now(),
                error
            );
        }
    }

    pub fn state(&self, node: usize) -> State {
        self.nodes[node].mac().state()
    }

    /// Timers the harness still considers armed for `node`.
    pub fn armed_timers(&self, node: usize) -> usize {
        self.medium.borrow().armed[node].is_some() as usize
    }

    pub fn delivered(&self, node: usize) -> Vec<(Address, Vec<u8>)> {
        self.medium.borrow().delivered[node].clone()
    }

    pub fn drops(&self, node: usize) -> Vec<DropReason> {
        self.medium.borrow().drops[node].clone()
    }
}

pub fn ms(value: u64) -> Instant {
    Instant::from_millis(value)
}
