//! Timed device events.
//!
//! A device which wants to be called back at some simulated time
//! (for example, when a character has finished printing) has an
//! entry here.  Each select code has at most one pending event.
use std::cmp::Reverse;
use std::time::Duration;

use keyed_priority_queue::KeyedPriorityQueue;
use tracing::{event, Level};

use base::prelude::*;

/// Entries are ordered by due time; events due at the same time are
/// serviced in select code order.
type Due = Reverse<(Duration, SelectCode)>;

#[derive(Debug)]
pub(crate) struct EventQueue {
    items: KeyedPriorityQueue<SelectCode, Due>,
}

impl EventQueue {
    pub(crate) fn new() -> EventQueue {
        EventQueue {
            items: KeyedPriorityQueue::new(),
        }
    }

    /// The earliest event, if any.
    pub(crate) fn peek(&self) -> Option<(SelectCode, Duration)> {
        self.items
            .peek()
            .map(|(sc, Reverse((due, _)))| (*sc, *due))
    }

    pub(crate) fn pop(&mut self) -> Option<(SelectCode, Duration)> {
        self.items.pop().map(|(sc, Reverse((due, _)))| (sc, due))
    }

    /// Pop the earliest event if it is due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(SelectCode, Duration)> {
        match self.peek() {
            Some((_, due)) if due <= now => self.pop(),
            Some((sc, due)) => {
                event!(
                    Level::TRACE,
                    "next event ({sc:?}) is not due yet; due={due:?}, now={now:?}"
                );
                None
            }
            None => None,
        }
    }

    /// Schedule an event for `sc` at `due`, replacing any event
    /// already pending for it.  Returns the previous due time.
    pub(crate) fn push(&mut self, sc: SelectCode, due: Duration) -> Option<Duration> {
        let previous = self
            .items
            .push(sc, Reverse((due, sc)))
            .map(|Reverse((prev, _))| prev);
        if let Some(prev) = previous {
            if prev < due {
                event!(
                    Level::WARN,
                    "event for select code {sc} pushed back from {prev:?} to {due:?}"
                );
            }
        }
        previous
    }

    pub(crate) fn cancel(&mut self, sc: SelectCode) -> Option<Duration> {
        self.items.remove(&sc).map(|Reverse((due, _))| due)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[test]
fn test_eventqueue_empty() {
    let mut q = EventQueue::new();
    assert!(q.is_empty());
    assert_eq!(0, q.len());
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
    assert_eq!(q.pop_due(Duration::from_secs(1)), None);
}

#[test]
fn test_eventqueue_repeat_push() {
    let mut q = EventQueue::new();
    let sc = sc!(0o12);
    assert_eq!(q.push(sc, Duration::from_micros(200)), None);
    assert_eq!(
        q.push(sc, Duration::from_micros(400)),
        Some(Duration::from_micros(200))
    );
    assert_eq!(
        q.push(sc, Duration::from_micros(300)),
        Some(Duration::from_micros(400))
    );
    assert_eq!(q.pop(), Some((sc, Duration::from_micros(300))));
    assert!(q.is_empty());
}

#[test]
fn test_eventqueue_order() {
    let mut q = EventQueue::new();
    q.push(sc!(0o30), Duration::from_micros(5));
    q.push(sc!(0o20), Duration::from_micros(5));
    q.push(sc!(0o10), Duration::from_micros(9));
    assert_eq!(q.pop_due(Duration::from_micros(4)), None);
    assert_eq!(
        q.pop_due(Duration::from_micros(6)),
        Some((sc!(0o20), Duration::from_micros(5)))
    );
    assert_eq!(
        q.pop_due(Duration::from_micros(6)),
        Some((sc!(0o30), Duration::from_micros(5)))
    );
    assert_eq!(q.pop_due(Duration::from_micros(6)), None);
    assert_eq!(q.cancel(sc!(0o10)), Some(Duration::from_micros(9)));
    assert!(q.is_empty());
}
