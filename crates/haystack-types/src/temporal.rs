use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Source of creation timestamps for revisions, tags and owners.
pub trait Clock: Send + Sync {
    /// Return the next timestamp. Implementations used by a store must never
    /// return a value less than or equal to a previously returned one.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, forced strictly monotonic within the process.
///
/// Two uploads finishing within the same clock tick still get distinct,
/// correctly ordered timestamps: when the wall clock has not moved past the
/// last issued value, the last value plus one nanosecond is issued instead.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_nanos: Mutex<i64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut last = self.last_nanos.lock().unwrap_or_else(|e| e.into_inner());
        let next = wall.max(last.saturating_add(1));
        *last = next;
        DateTime::from_timestamp_nanos(next)
    }
}

/// Deterministic clock for tests: starts at a fixed instant and advances by
/// a fixed step on every call.
///
/// Only built for this crate's tests or with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct FixedClock {
    next: Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

#[cfg(any(test, feature = "test-util"))]
impl FixedClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let current = *next;
        *next = current + self.step;
        current
    }
}

/// Index ordering key for a creation timestamp.
///
/// Nanoseconds since the epoch, zero-padded to 20 digits, so lexicographic
/// order equals chronological order.
pub fn order_key(at: &DateTime<Utc>) -> String {
    let nanos = at.timestamp_nanos_opt().unwrap_or(i64::MAX).max(0);
    format!("{nanos:020}")
}
