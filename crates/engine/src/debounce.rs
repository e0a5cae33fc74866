//! Timer-based coalescing of keyed updates.
//!
//! Each key holds at most one pending value. Scheduling again before the
//! window elapses replaces the value and restarts the window, so a burst of
//! intermediate events yields a single write carrying the last value. The
//! caller owns the clock: every operation takes `now`.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct Pending<V> {
    value: V,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    window: Duration,
    pending: FxHashMap<K, Pending<V>>,
    /// Number of schedules absorbed into an already pending value.
    coalesced: u64,
}

impl<K, V> Debouncer<K, V>
where
    K: Copy + Eq + Ord + std::hash::Hash,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashMap::default(),
            coalesced: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Queue `value` for `key`. Returns true if it replaced a pending value.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) -> bool {
        let deadline = now + self.window;
        let replaced = self
            .pending
            .insert(key, Pending { value, deadline })
            .is_some();
        if replaced {
            self.coalesced += 1;
        }
        replaced
    }

    /// Remove and return every value whose window has elapsed, in deadline
    /// order (ties by key).
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let mut due: Vec<(Instant, K)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (p.deadline, *k))
            .collect();
        due.sort();
        due.into_iter()
            .filter_map(|(_, k)| self.pending.remove(&k).map(|p| (k, p.value)))
            .collect()
    }

    /// Remove and return everything pending, regardless of deadline.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut all: Vec<(Instant, K, V)> = self
            .pending
            .drain()
            .map(|(k, p)| (p.deadline, k, p.value))
            .collect();
        all.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        all.into_iter().map(|(_, k, v)| (k, v)).collect()
    }

    /// Drop the pending value for `key`, returning it.
    pub fn cancel(&mut self, key: K) -> Option<V> {
        self.pending.remove(&key).map(|p| p.value)
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Earliest deadline among pending values.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    #[test]
    fn test_burst_collapses_to_last_value() {
        let t0 = Instant::now();
        let mut d: Debouncer<u32, &str> = Debouncer::new(WINDOW);
        assert!(!d.schedule(1, "a", t0));
        assert!(d.schedule(1, "b", t0 + Duration::from_millis(100)));
        assert!(d.schedule(1, "c", t0 + Duration::from_millis(200)));

        // Window restarted at 200ms, so nothing is due at 300ms.
        assert!(d.take_due(t0 + Duration::from_millis(300)).is_empty());
        assert_eq!(d.take_due(t0 + Duration::from_millis(450)), vec![(1, "c")]);
        assert!(d.is_empty());
        assert_eq!(d.coalesced(), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let t0 = Instant::now();
        let mut d: Debouncer<u32, u32> = Debouncer::new(WINDOW);
        d.schedule(2, 20, t0);
        d.schedule(1, 10, t0 + Duration::from_millis(100));

        assert_eq!(d.take_due(t0 + WINDOW), vec![(2, 20)]);
        assert!(d.is_pending(1));
        assert_eq!(d.next_deadline(), Some(t0 + Duration::from_millis(100) + WINDOW));
    }

    #[test]
    fn test_drain_and_cancel() {
        let t0 = Instant::now();
        let mut d: Debouncer<u32, u32> = Debouncer::new(WINDOW);
        d.schedule(3, 30, t0);
        d.schedule(1, 10, t0);
        d.schedule(2, 20, t0);
        assert_eq!(d.cancel(2), Some(20));
        assert_eq!(d.drain(), vec![(1, 10), (3, 30)]);
        assert!(d.drain().is_empty());
    }
}
