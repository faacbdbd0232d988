//! Virtual-clock timer queue.
//!
//! Every delayed or periodic behavior in the client (tremolo, debounced
//! renders, staggered requests, reconnection) is an entry in a `TimerQueue`.
//! The clock only moves when the owner calls [`TimerQueue::pop_due`] or
//! [`TimerQueue::advance`], so the same state machines run against wall-clock
//! time in the binary and against plain durations in tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Handle returned by [`TimerQueue::schedule`], used to cancel the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered queue of pending events.
///
/// Entries with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<(Duration, u64), E>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `event` to fire `delay` after the current virtual time.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = self.now + delay;
        self.entries.insert((due, id.0), event);
        self.deadlines.insert(id, due);
        id
    }

    /// Cancel a pending entry. Returns the event if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<E> {
        let due = self.deadlines.remove(&id)?;
        self.entries.remove(&(due, id.0))
    }

    /// Cancel every entry matching `pred`. Returns how many were removed.
    pub fn cancel_where(&mut self, pred: impl Fn(&E) -> bool) -> usize {
        let doomed: Vec<(Duration, u64)> = self
            .entries
            .iter()
            .filter(|(_, event)| pred(event))
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            self.entries.remove(key);
            self.deadlines.remove(&TimerId(key.1));
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Deadline of a pending entry.
    pub fn deadline(&self, id: TimerId) -> Option<Duration> {
        self.deadlines.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&E) -> bool) -> usize {
        self.entries.values().filter(|event| pred(event)).count()
    }

    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.entries.values()
    }

    /// Remove and return the earliest entry due at or before `until`.
    ///
    /// The clock is moved to that entry's deadline, so anything the handler
    /// schedules is relative to when the timer was due, not to `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, E)> {
        let (&(due, raw), _) = self.entries.iter().next()?;
        if due > until {
            return None;
        }
        let event = self.entries.remove(&(due, raw))?;
        self.deadlines.remove(&TimerId(raw));
        if due > self.now {
            self.now = due;
        }
        Some((TimerId(raw), event))
    }

    /// Move the clock forward without firing anything. Never moves backwards.
    pub fn advance(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
