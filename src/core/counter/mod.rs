// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Counter State
//!
//! The mutable heart of a counting stage: a table of per-key count vectors
//! behind a single mutex. Producers call [`CounterState::countups`] with
//! pre-classified increment vectors; the watcher thread calls
//! [`CounterState::flush`] once per interval, atomically swapping in a fresh
//! table. The lock is held only for O(pattern-count) arithmetic or the table
//! swap, never across I/O or emission.
//!
//! Every vector carries one trailing running-sum slot. Invariant: the sum
//! slot equals the cumulative sum of all other slots added since the
//! vector's creation.

pub mod classifier;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::config::{Aggregate, AGGREGATE_ALL_KEY};

/// Point-in-time capture of the counter table handed to the reporting path.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Captured table; vectors include the trailing running-sum slot.
    pub counts: HashMap<String, Vec<u64>>,
    /// Measured wall-clock seconds since the previous flush.
    pub elapsed_secs: f64,
}

#[derive(Debug)]
struct Inner {
    counts: HashMap<String, Vec<u64>>,
    last_flush: Instant,
}

/// Exclusive, thread-safe table of per-key count vectors.
#[derive(Debug)]
pub struct CounterState {
    /// Vector width: bucket count plus the trailing running-sum slot.
    slots: usize,
    aggregate: Aggregate,
    inner: Mutex<Inner>,
}

impl CounterState {
    /// `buckets` is the pattern count including the reserved index 0.
    pub fn new(buckets: usize, aggregate: Aggregate) -> Self {
        let slots = buckets + 1;
        let mut counts = HashMap::new();
        if aggregate == Aggregate::All {
            counts.insert(AGGREGATE_ALL_KEY.to_string(), vec![0u64; slots]);
        }
        Self {
            slots,
            aggregate,
            inner: Mutex::new(Inner {
                counts,
                last_flush: Instant::now(),
            }),
        }
    }

    /// Bucket count, the running-sum slot excluded.
    pub fn buckets(&self) -> usize {
        self.slots - 1
    }

    /// Index of the running-sum slot inside a vector.
    pub fn sum_slot(&self) -> usize {
        self.slots - 1
    }

    /// Accumulate an increment vector under the given tag.
    ///
    /// `increments` has one slot per bucket (no sum slot). The effective key
    /// is forced to `"all"` in global-aggregate mode; the vector is
    /// allocated lazily on first use.
    pub fn countups(&self, tag: &str, increments: &[u64]) {
        debug_assert_eq!(increments.len(), self.buckets());
        let key = match self.aggregate {
            Aggregate::All => AGGREGATE_ALL_KEY,
            Aggregate::Tag => tag,
        };
        let mut inner = self.inner.lock().unwrap();
        let vector = inner
            .counts
            .entry(key.to_string())
            .or_insert_with(|| vec![0u64; self.slots]);
        let mut total = 0u64;
        for (slot, inc) in vector.iter_mut().zip(increments) {
            *slot += inc;
            total += inc;
        }
        vector[self.slots - 1] += total;
    }

    /// Capture the table and swap in a fresh one.
    ///
    /// The fresh table holds zeroed vectors for exactly the keys whose
    /// captured total was nonzero; dead keys are pruned. The flush baseline
    /// resets to now. This is the single serialization point between
    /// producers and the reporter.
    pub fn flush(&self) -> Snapshot {
        let sum = self.sum_slot();
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_flush).as_secs_f64();
        let fresh: HashMap<String, Vec<u64>> = inner
            .counts
            .iter()
            .filter(|(_, v)| v[sum] > 0)
            .map(|(k, _)| (k.clone(), vec![0u64; self.slots]))
            .collect();
        let counts = std::mem::replace(&mut inner.counts, fresh);
        inner.last_flush = now;
        Snapshot {
            counts,
            elapsed_secs,
        }
    }

    /// Seconds since the previous flush. Scheduler poll path.
    pub fn elapsed_secs(&self) -> f64 {
        self.inner.lock().unwrap().last_flush.elapsed().as_secs_f64()
    }

    /// Copy the live table and elapsed seconds without resetting anything.
    /// Persistence save path.
    pub fn export(&self) -> (HashMap<String, Vec<u64>>, f64) {
        let inner = self.inner.lock().unwrap();
        (inner.counts.clone(), inner.last_flush.elapsed().as_secs_f64())
    }

    /// Install a restored table verbatim and rewind the flush baseline to
    /// `now - saved_duration` so interval accounting continues across a
    /// restart.
    pub fn restore(&self, counts: HashMap<String, Vec<u64>>, saved_duration: f64) {
        debug_assert!(counts.values().all(|v| v.len() == self.slots));
        let mut inner = self.inner.lock().unwrap();
        inner.counts = counts;
        let now = Instant::now();
        inner.last_flush = now
            .checked_sub(Duration::from_secs_f64(saved_duration.max(0.0)))
            .unwrap_or(now);
    }
}
