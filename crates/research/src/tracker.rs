//! Frequency tracker
//!
//! Per-run tally of how often each paper id shows up in the seed set and the
//! expanded citation graph. Seeds enter with weight [`SEED_WEIGHT`]; every
//! reference or citation edge adds one. Ties in [`FrequencyTracker::top_k`]
//! are broken by first-seen order, so the ranking is deterministic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Starting weight of a seed paper
pub const SEED_WEIGHT: u64 = 2;

#[derive(Debug, Clone, Copy)]
struct Tally {
    count: u64,
    first_seen: u64,
}

#[derive(Debug, Default)]
struct TallyMap {
    entries: HashMap<String, Tally>,
    next_seq: u64,
}

impl TallyMap {
    fn add(&mut self, id: &str, weight: u64) {
        if let Some(tally) = self.entries.get_mut(id) {
            tally.count += weight;
            return;
        }
        let first_seen = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id.to_string(), Tally { count: weight, first_seen });
    }
}

/// Thread-safe paper frequency table
#[derive(Debug, Default)]
pub struct FrequencyTracker {
    inner: Mutex<TallyMap>,
}

impl FrequencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-applied update.
    fn lock(&self) -> MutexGuard<'_, TallyMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear all counts and first-seen order
    pub fn reset(&self) {
        let mut map = self.lock();
        map.entries.clear();
        map.next_seq = 0;
    }

    /// Add [`SEED_WEIGHT`] to `id`. Not idempotent.
    pub fn seed(&self, id: &str) {
        if !id.is_empty() {
            self.lock().add(id, SEED_WEIGHT);
        }
    }

    /// Add one to `id`
    pub fn bump(&self, id: &str) {
        if !id.is_empty() {
            self.lock().add(id, 1);
        }
    }

    /// The `k` most frequent ids, highest count first
    pub fn top_k(&self, k: usize) -> Vec<String> {
        self.top_k_with_counts(k).into_iter().map(|(id, _)| id).collect()
    }

    /// Like [`top_k`](Self::top_k), with counts
    pub fn top_k_with_counts(&self, k: usize) -> Vec<(String, u64)> {
        if k == 0 {
            return Vec::new();
        }

        // Sort a snapshot so the lock is only held for the copy
        let mut snapshot: Vec<(String, Tally)> = {
            let map = self.lock();
            map.entries.iter().map(|(id, tally)| (id.clone(), *tally)).collect()
        };

        snapshot.sort_unstable_by(|(_, a), (_, b)| {
            b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen))
        });
        snapshot.truncate(k);
        snapshot.into_iter().map(|(id, tally)| (id, tally.count)).collect()
    }

    pub fn count(&self, id: &str) -> u64 {
        self.lock().entries.get(id).map_or(0, |tally| tally.count)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
