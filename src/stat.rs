//! Process-wide stat aggregation.
//!
//! One [`Stat`] is shared (via `Arc`) between the pool supervisor and every
//! worker monitor thread. Monitors feed it baseline-corrected deltas; the
//! supervisor's caller reads the totals once the pool has drained.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct StatInner {
    counters: BTreeMap<String, u64>,
    speed_keys: BTreeSet<String>,
}

/// Thread-safe accumulator of named counters plus the set of keys flagged
/// for rate display.
///
/// All mutation goes through one mutex so increments from different monitor
/// threads are linearizable. The lock is only ever held for the duration of
/// a map update, never across I/O.
#[derive(Debug, Default)]
pub struct Stat {
    inner: Mutex<StatInner>,
}

impl Stat {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatInner> {
        // A panicked monitor thread cannot leave a counter map half-updated,
        // so a poisoned lock is still safe to reuse.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `delta` to the named counter, creating it at 0 if absent.
    pub fn inc(&self, key: &str, delta: u64) {
        let mut inner = self.lock();
        *inner.counters.entry(key.to_string()).or_insert(0) += delta;
    }

    /// Merge keys into the tracked speed-key set. Idempotent.
    pub fn register_speed_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut inner = self.lock();
        inner.speed_keys.extend(keys);
    }

    /// Sorted snapshot of all counter totals.
    pub fn totals(&self) -> BTreeMap<String, u64> {
        self.lock().counters.clone()
    }

    /// The set of counter names flagged for rate display.
    pub fn speed_keys(&self) -> BTreeSet<String> {
        self.lock().speed_keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_inc_creates_counter_at_zero() {
        let stat = Stat::new();
        stat.inc("request", 5);
        assert_eq!(stat.totals().get("request"), Some(&5));
    }

    #[test]
    fn test_inc_accumulates() {
        let stat = Stat::new();
        stat.inc("request", 5);
        stat.inc("request", 7);
        stat.inc("error", 1);
        assert_eq!(stat.totals().get("request"), Some(&12));
        assert_eq!(stat.totals().get("error"), Some(&1));
    }

    #[test]
    fn test_inc_zero_delta_keeps_total() {
        let stat = Stat::new();
        stat.inc("request", 5);
        stat.inc("request", 0);
        assert_eq!(stat.totals().get("request"), Some(&5));
    }

    #[test]
    fn test_totals_are_sorted() {
        let stat = Stat::new();
        stat.inc("zeta", 1);
        stat.inc("alpha", 1);
        stat.inc("mid", 1);
        let keys: Vec<String> = stat.totals().into_keys().collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_speed_key_registration_is_idempotent() {
        let stat = Stat::new();
        stat.register_speed_keys(vec!["request".to_string()]);
        stat.register_speed_keys(vec!["request".to_string(), "page".to_string()]);
        let keys = stat.speed_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("request"));
        assert!(keys.contains("page"));
    }

    #[test]
    fn test_concurrent_increments_sum() {
        let stat = Arc::new(Stat::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stat = Arc::clone(&stat);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    stat.inc("request", 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stat.totals().get("request"), Some(&8000));
    }
}
