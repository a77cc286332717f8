//! Bounded FIFO of payloads awaiting transmission, drop-tail on overflow.

use alloc::collections::VecDeque;

use crate::device::payload::Payload;
use crate::device::radio::types::Address;
use crate::time::Instant;

/// One payload waiting for its acknowledgment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueEntry {
    /// Data to send.
    pub payload: Payload,
    /// Final destination.
    pub dest: Address,
    /// Node that first submitted the payload.
    pub origin: Address,
    /// When the entry was queued.
    pub enqueued_at: Instant,
}

/// Rejected submission; the entry is handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFull(pub QueueEntry);

/// FIFO of [`QueueEntry`] with a fixed capacity.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
}

impl OutboundQueue {
    /// An empty queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append `entry`, or hand it back when the queue is full. Never blocks.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull(entry));
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// The entry currently being transmitted.
    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Remove the head, on acknowledgment or when its attempts ran out.
    pub fn dequeue_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Entries waiting.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is nothing waiting?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Would the next enqueue be rejected?
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8) -> QueueEntry {
        QueueEntry {
            payload: Payload::from_slice(&[byte]).unwrap(),
            dest: Address(0),
            origin: Address(1),
            enqueued_at: Instant::ZERO,
        }
    }

    #[test]
    fn fifo_order() {
        let mut queue = OutboundQueue::new(4);
        for b in 0..3 {
            queue.enqueue(entry(b)).unwrap();
        }
        assert_eq!(queue.front().map(|e| e.payload.as_ref()[0]), Some(0));
        assert_eq!(queue.dequeue_front().map(|e| e.payload.as_ref()[0]), Some(0));
        assert_eq!(queue.dequeue_front().map(|e| e.payload.as_ref()[0]), Some(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drop_tail_when_full() {
        let mut queue = OutboundQueue::new(2);
        queue.enqueue(entry(1)).unwrap();
        queue.enqueue(entry(2)).unwrap();
        let rejected = queue.enqueue(entry(3)).unwrap_err();
        assert_eq!(rejected.0.payload.as_ref(), &[3]);
        assert_eq!(queue.len(), 2);
        assert!(queue.is_full());
        // head is untouched by the rejected submission
        assert_eq!(queue.front().map(|e| e.payload.as_ref()[0]), Some(1));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut queue = OutboundQueue::new(3);
        for b in 0..50u8 {
            let _ = queue.enqueue(entry(b));
            if b % 4 == 0 {
                queue.dequeue_front();
            }
            assert!(queue.len() <= queue.capacity());
        }
    }
}
