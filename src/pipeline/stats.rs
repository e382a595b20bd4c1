use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    flush_count: AtomicU64,
    flush_event_count: AtomicU64,
    flush_duration_ms: AtomicU64,
    upload_failures: AtomicU64,
    rejected_batches: AtomicU64,
    rejected_events: AtomicU64,
    evicted_events: AtomicU64,
    dropped_events: AtomicU64,
    discarded_records: AtomicU64,
}

/// Shared counters updated by the coordinator's tasks.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    counters: Arc<Counters>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One successful upload cycle.
    pub fn record_flush(&self, events: usize, duration: Duration) {
        let c = &self.counters;
        c.flush_count.fetch_add(1, Ordering::Relaxed);
        c.flush_event_count.fetch_add(events as u64, Ordering::Relaxed);
        c.flush_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.counters.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, events: usize) {
        let c = &self.counters;
        c.rejected_batches.fetch_add(1, Ordering::Relaxed);
        c.rejected_events.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.counters.evicted_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, records: usize) {
        self.counters
            .discarded_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> StatsSnapshot {
        let c = &self.counters;
        let flush_count = c.flush_count.load(Ordering::Relaxed);
        let flush_duration = Duration::from_millis(c.flush_duration_ms.load(Ordering::Relaxed));
        let average_flush_duration = if flush_count > 0 {
            flush_duration / flush_count as u32
        } else {
            Duration::ZERO
        };

        StatsSnapshot {
            timestamp,
            flush_count,
            flush_event_count: c.flush_event_count.load(Ordering::Relaxed),
            flush_duration,
            average_flush_duration,
            upload_failures: c.upload_failures.load(Ordering::Relaxed),
            rejected_batches: c.rejected_batches.load(Ordering::Relaxed),
            rejected_events: c.rejected_events.load(Ordering::Relaxed),
            evicted_events: c.evicted_events.load(Ordering::Relaxed),
            dropped_events: c.dropped_events.load(Ordering::Relaxed),
            discarded_records: c.discarded_records.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub flush_count: u64,
    pub flush_event_count: u64,
    pub flush_duration: Duration,
    pub average_flush_duration: Duration,
    pub upload_failures: u64,
    pub rejected_batches: u64,
    pub rejected_events: u64,
    pub evicted_events: u64,
    pub dropped_events: u64,
    pub discarded_records: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flushes={} events={} avg_flush={:?} failures={} rejected={} evicted={} dropped={} discarded={}",
            self.flush_count,
            self.flush_event_count,
            self.average_flush_duration,
            self.upload_failures,
            self.rejected_events,
            self.evicted_events,
            self.dropped_events,
            self.discarded_records
        )
    }
}
