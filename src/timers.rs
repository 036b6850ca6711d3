//! Virtual-clock timer queue for one-shot completion callbacks.
//!
//! Timers are ordered by deadline, then by id, so completions scheduled for the
//! same instant fire in the order they were scheduled. Nothing here sleeps;
//! callers move the clock forward with [`run_until`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Handle to a scheduled timer.
pub type TimerId = u64;

/// Deferred callback run against the host that owns the timer queue.
pub type TimerCallback<C> = Box<dyn FnOnce(&mut C, TimerId)>;

pub struct Timers<C> {
    now: Duration,
    next_id: TimerId,
    pending: BTreeMap<(Duration, TimerId), TimerCallback<C>>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<C> Timers<C> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 1,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `callback` to run once, `after` from now.
    pub fn schedule<F>(&mut self, after: Duration, callback: F) -> TimerId
    where
        F: FnOnce(&mut C, TimerId) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        // Saturates at Duration::MAX.
        let deadline = self.now.saturating_add(after);
        self.pending.insert((deadline, id), Box::new(callback));
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a pending timer; returns false if it already fired or never existed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.pending.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove the earliest timer due at or before `until`, moving the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, TimerCallback<C>)> {
        let (&(deadline, id), _) = self.pending.iter().next()?;
        if deadline > until {
            return None;
        }
        let callback = self.pending.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        if deadline > self.now {
            self.now = deadline;
        }
        Some((id, callback))
    }

    /// Move the clock forward without firing anything. Never moves it backwards.
    pub fn advance_to(&mut self, t: Duration) {
        if t > self.now {
            self.now = t;
        }
    }
}

impl<C> Default for Timers<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a timer queue whose callbacks run against it.
pub trait TimerHost: Sized {
    fn timers_mut(&mut self) -> &mut Timers<Self>;
}

/// Fire every timer due at or before `deadline`, then park the clock there.
///
/// Callbacks may schedule further timers; those fire in the same pass if they
/// are also due. Returns the number of callbacks run.
pub fn run_until<C: TimerHost>(host: &mut C, deadline: Duration) -> usize {
    let mut fired = 0;
    while let Some((id, callback)) = host.timers_mut().pop_due(deadline) {
        callback(host, id);
        fired += 1;
    }
    host.timers_mut().advance_to(deadline);
    fired
}
