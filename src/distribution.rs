//! Online frequency distribution over non-negative integer samples.
//!
//! Keeps a running count, an incrementally-updated mean, and a value →
//! occurrence histogram from which an exact median is derived without
//! retaining individual samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accumulator for visit counts, travel times, and inter-visit durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    values: BTreeMap<i64, u64>,
    count: u64,
    average: f64,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample. Values are expected to be non-negative.
    pub fn add_value(&mut self, v: i64) {
        debug_assert!(v >= 0, "distribution samples must be non-negative");
        *self.values.entry(v).or_insert(0) += 1;
        self.average = (self.average * self.count as f64 + v as f64) / (self.count + 1) as f64;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean, 0 if no sample was recorded.
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Exact median of the recorded multiset, 0 if empty.
    ///
    /// Walks the histogram in key order accumulating occurrence counts. The
    /// median is the first key whose cumulative count passes half the total;
    /// when the half-way point falls exactly between two distinct keys, the
    /// median is their mean. Insertion order never affects the result.
    pub fn median(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut cumulative = 0u64;
        let mut prev_key: Option<i64> = None;
        for (&key, &occurrences) in &self.values {
            if let Some(prev) = prev_key {
                if 2 * cumulative == self.count {
                    return (key + prev) as f64 / 2.0;
                }
            }
            cumulative += occurrences;
            if 2 * cumulative > self.count {
                return key as f64;
            }
            prev_key = Some(key);
        }
        // unreachable for a non-empty histogram
        0.0
    }

    /// Histogram of recorded values in ascending key order.
    pub fn histogram(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}
