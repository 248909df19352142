// SPDX: CC0-1.0

//! Coalescing of bursts of edits into one deferred action per key.

use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Pending<K, A> {
    key: K,
    due: Instant,
    action: A,
}

/// Holds at most one pending action per key, each due at a fixed delay after
/// it was last scheduled.
///
/// Intermediate actions are dropped; the latest one for a key always runs
/// eventually, either from [`Coalescer::poll`] once due or from
/// [`Coalescer::flush`].
#[derive(Clone, Debug)]
pub struct Coalescer<K, A> {
    pending: Vec<Pending<K, A>>,
}

impl<K, A> Default for Coalescer<K, A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K: PartialEq, A> Coalescer<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to run `delay` after `now`, replacing and
    /// returning whatever was pending under `key`.
    pub fn schedule(&mut self, key: K, delay: Duration, action: A, now: Instant) -> Option<A> {
        let replaced = self.flush(&key);
        self.pending.push(Pending {
            key,
            due: now + delay,
            action,
        });
        replaced
    }

    pub fn peek(&self, key: &K) -> Option<&A> {
        self.pending.iter().find(|p| &p.key == key).map(|p| &p.action)
    }

    /// Removes the action pending under `key` so it can run right away.
    pub fn flush(&mut self, key: &K) -> Option<A> {
        let idx = self.pending.iter().position(|p| &p.key == key)?;
        Some(self.pending.remove(idx).action)
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn poll(&mut self, now: Instant) -> Vec<(K, A)> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        Self::in_due_order(due)
    }

    /// Removes and returns everything pending, earliest first.
    pub fn flush_all(&mut self) -> Vec<(K, A)> {
        let all = core::mem::take(&mut self.pending);
        Self::in_due_order(all)
    }

    /// When the next pending action falls due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn in_due_order(mut pending: Vec<Pending<K, A>>) -> Vec<(K, A)> {
        // stable, so equal deadlines keep scheduling order
        pending.sort_by_key(|p| p.due);
        pending.into_iter().map(|p| (p.key, p.action)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn rescheduling_replaces_and_postpones() {
        let t0 = Instant::now();
        let mut c = Coalescer::new();
        assert_eq!(c.schedule("expr", 300 * MS, "s", t0), None);
        assert_eq!(c.schedule("expr", 300 * MS, "si", t0 + 100 * MS), Some("s"));
        assert_eq!(c.schedule("expr", 300 * MS, "sin", t0 + 200 * MS), Some("si"));
        assert_eq!(c.len(), 1);

        // the first deadline has passed but the latest edit postponed it
        assert!(c.poll(t0 + 300 * MS).is_empty());
        assert_eq!(c.poll(t0 + 500 * MS), vec![("expr", "sin")]);
        assert!(c.is_empty());
    }

    #[test]
    fn keys_are_independent_and_due_in_order() {
        let t0 = Instant::now();
        let mut c = Coalescer::new();
        c.schedule(1, 400 * MS, 'r', t0);
        c.schedule(2, 100 * MS, 'p', t0);
        c.schedule(3, 300 * MS, 't', t0);
        assert_eq!(c.next_due(), Some(t0 + 100 * MS));
        assert_eq!(c.poll(t0 + 350 * MS), vec![(2, 'p'), (3, 't')]);
        assert_eq!(c.next_due(), Some(t0 + 400 * MS));
        assert_eq!(c.poll(t0 + 10 * 400 * MS), vec![(1, 'r')]);
        assert_eq!(c.next_due(), None);
    }

    #[test]
    fn flush_runs_immediately() {
        let t0 = Instant::now();
        let mut c = Coalescer::new();
        c.schedule("pan", 100 * MS, 7, t0);
        c.schedule("range", 400 * MS, 8, t0);
        assert_eq!(c.flush(&"pan"), Some(7));
        assert_eq!(c.flush(&"pan"), None);
        assert_eq!(c.flush_all(), vec![("range", 8)]);
        assert!(c.is_empty());
    }
}
