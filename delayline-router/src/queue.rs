use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;

use delayline_common::unix_micros;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}

/// A single buffered datagram.
#[derive(Debug, Clone)]
pub struct Message {
    /// Monotonic arrival instant, drives delay maturity.
    arrived_at: Instant,
    /// Wall-clock arrival stamp in UNIX microseconds, for display.
    timestamp: u64,
    /// The datagram payload. Forwarded unchanged; may be empty.
    payload: Bytes,
}

impl Message {
    /// Stamps a received payload with the current time.
    pub fn new(payload: Bytes) -> Self {
        Self { arrived_at: Instant::now(), timestamp: unix_micros(), payload }
    }

    #[cfg(test)]
    pub(crate) fn with_arrival(arrived_at: Instant, payload: Bytes) -> Self {
        Self { arrived_at, timestamp: unix_micros(), payload }
    }

    #[inline]
    pub fn arrived_at(&self) -> Instant {
        self.arrived_at
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// A consistent point-in-time view of a queue, taken under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Number of buffered messages.
    pub pending: usize,
    /// Wall-clock stamp of the head message, if any.
    pub head_arrival: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<Message>,
    /// When the head message matures. `None` iff `messages` is empty;
    /// recomputed whenever the head changes so readiness is O(1).
    next_service: Option<Instant>,
}

/// FIFO buffer of received-but-not-yet-forwarded messages for one route.
///
/// Messages enter at the tail as datagrams arrive and leave at the head once
/// they have been held for the route's delay. Insertion order is arrival
/// order; nothing is ever reordered.
#[derive(Debug)]
pub struct RouteQueue {
    delay: Duration,
    inner: Mutex<Inner>,
}

impl RouteQueue {
    pub fn new(delay: Duration) -> Self {
        Self { delay, inner: Mutex::new(Inner::default()) }
    }

    /// Appends a message to the tail. O(1).
    pub fn enqueue(&self, msg: Message) {
        let mut inner = self.inner.lock();
        if inner.messages.is_empty() {
            inner.next_service = Some(msg.arrived_at + self.delay);
        }
        inner.messages.push_back(msg);
    }

    /// Removes and returns the head message.
    ///
    /// Callers are expected to have checked maturity first; the scheduler
    /// uses [`pop_ready`](Self::pop_ready) which does.
    pub fn pop_head(&self) -> Result<Message, QueueError> {
        let mut inner = self.inner.lock();
        let msg = inner.messages.pop_front().ok_or(QueueError::Empty)?;
        inner.next_service = inner.messages.front().map(|m| m.arrived_at + self.delay);
        Ok(msg)
    }

    /// Removes the head message if it has matured. Returns `None` on an
    /// empty queue or an immature head, so it is always safe to call.
    pub fn pop_ready(&self, now: Instant) -> Option<Message> {
        let mut inner = self.inner.lock();
        match inner.next_service {
            Some(at) if at <= now => {
                let msg = inner.messages.pop_front()?;
                inner.next_service = inner.messages.front().map(|m| m.arrived_at + self.delay);
                Some(msg)
            }
            _ => None,
        }
    }

    /// Puts a message back at the head, e.g. after a failed forward that a
    /// delivery policy wants retried. Preserves FIFO order.
    pub(crate) fn requeue_front(&self, msg: Message) {
        let mut inner = self.inner.lock();
        inner.next_service = Some(msg.arrived_at + self.delay);
        inner.messages.push_front(msg);
    }

    /// Returns a copy of the head message without removing it.
    pub fn peek_head(&self) -> Option<Message> {
        self.inner.lock().messages.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }

    /// Wall-clock stamp of the head message, if any.
    pub fn head_arrival(&self) -> Option<u64> {
        self.inner.lock().messages.front().map(Message::timestamp)
    }

    /// When the head message matures. `None` iff the queue is empty.
    pub fn next_service(&self) -> Option<Instant> {
        self.inner.lock().next_service
    }

    /// Pending count and head stamp read under a single lock.
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock();
        QueueSnapshot {
            pending: inner.messages.len(),
            head_arrival: inner.messages.front().map(Message::timestamp),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(payload: &'static [u8]) -> Message {
        Message::new(Bytes::from_static(payload))
    }

    #[test]
    fn fifo_order() {
        let queue = RouteQueue::new(Duration::ZERO);
        queue.enqueue(msg(b"one"));
        queue.enqueue(msg(b"two"));
        queue.enqueue(msg(b"three"));

        assert_eq!(queue.pop_head().unwrap().payload(), &Bytes::from_static(b"one"));
        assert_eq!(queue.pop_head().unwrap().payload(), &Bytes::from_static(b"two"));
        assert_eq!(queue.pop_head().unwrap().payload(), &Bytes::from_static(b"three"));
        assert_eq!(queue.pop_head().unwrap_err(), QueueError::Empty);
    }

    #[test]
    fn length_accounting() {
        let queue = RouteQueue::new(Duration::from_secs(1));
        for _ in 0..5 {
            queue.enqueue(msg(b"x"));
        }
        assert_eq!(queue.len(), 5);

        for _ in 0..3 {
            queue.pop_head().unwrap();
        }
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty());
    }

    #[test]
    fn next_service_tracks_head() {
        let delay = Duration::from_secs(10);
        let queue = RouteQueue::new(delay);
        assert_eq!(queue.next_service(), None);

        let t0 = Instant::now();
        queue.enqueue(Message::with_arrival(t0, Bytes::from_static(b"a")));
        assert_eq!(queue.next_service(), Some(t0 + delay));

        // A second message does not move the service time.
        let t1 = t0 + Duration::from_secs(3);
        queue.enqueue(Message::with_arrival(t1, Bytes::from_static(b"b")));
        assert_eq!(queue.next_service(), Some(t0 + delay));

        // Popping the head recomputes from the new head.
        queue.pop_head().unwrap();
        assert_eq!(queue.next_service(), Some(t1 + delay));

        queue.pop_head().unwrap();
        assert_eq!(queue.next_service(), None);
    }

    #[test]
    fn pop_ready_guards_maturity() {
        let delay = Duration::from_secs(10);
        let queue = RouteQueue::new(delay);

        let t0 = Instant::now();
        queue.enqueue(Message::with_arrival(t0, Bytes::from_static(b"a")));

        assert!(queue.pop_ready(t0 + Duration::from_secs(5)).is_none());
        assert_eq!(queue.len(), 1);

        let popped = queue.pop_ready(t0 + delay).unwrap();
        assert_eq!(popped.payload(), &Bytes::from_static(b"a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_ready_on_empty_is_a_noop() {
        let queue = RouteQueue::new(Duration::ZERO);
        assert!(queue.pop_ready(Instant::now()).is_none());
    }

    #[test]
    fn zero_delay_matures_at_arrival() {
        let queue = RouteQueue::new(Duration::ZERO);
        let t0 = Instant::now();
        queue.enqueue(Message::with_arrival(t0, Bytes::from_static(b"a")));
        assert_eq!(queue.next_service(), Some(t0));
        assert!(queue.pop_ready(t0).is_some());
    }

    #[test]
    fn peek_does_not_mutate() {
        let queue = RouteQueue::new(Duration::ZERO);
        queue.enqueue(msg(b"head"));
        queue.enqueue(msg(b"tail"));

        let peeked = queue.peek_head().unwrap();
        assert_eq!(peeked.payload(), &Bytes::from_static(b"head"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.head_arrival(), Some(peeked.timestamp()));
    }

    #[test]
    fn empty_payload_is_queued() {
        let queue = RouteQueue::new(Duration::ZERO);
        queue.enqueue(Message::new(Bytes::new()));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_head().unwrap().payload().is_empty());
    }

    #[test]
    fn requeue_front_restores_head() {
        let delay = Duration::from_millis(100);
        let queue = RouteQueue::new(delay);

        let t0 = Instant::now();
        queue.enqueue(Message::with_arrival(t0, Bytes::from_static(b"a")));
        queue.enqueue(Message::with_arrival(t0 + Duration::from_millis(1), Bytes::from_static(b"b")));

        let head = queue.pop_ready(t0 + delay).unwrap();
        queue.requeue_front(head);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_service(), Some(t0 + delay));
        assert_eq!(
            queue.pop_head().unwrap().payload(),
            &Bytes::from_static(b"a")
        );
    }

    #[test]
    fn snapshot_is_consistent() {
        let queue = RouteQueue::new(Duration::ZERO);
        assert_eq!(queue.snapshot(), QueueSnapshot { pending: 0, head_arrival: None });

        queue.enqueue(msg(b"a"));
        let snap = queue.snapshot();
        assert_eq!(snap.pending, 1);
        assert_eq!(snap.head_arrival, queue.head_arrival());
    }
}
