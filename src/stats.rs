//! Per-bus atomic counters (§4.8).
//!
//! All counters use `Relaxed` ordering: they are diagnostic, not
//! synchronizing, and are only guaranteed eventually consistent with each
//! other (§4.8, §8.1 property 3 "at all quiescent points").

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    total_messages_written: AtomicU64,
    total_messages_read: AtomicU64,
    total_bytes_written: AtomicU64,
    total_bytes_read: AtomicU64,
    failed_writes: AtomicU64,
    failed_reads: AtomicU64,
    dropped_corrupt: AtomicU64,
    peak_pending: AtomicU64,
    /// Signed so concurrent increments/decrements can never underflow into a
    /// huge positive wraparound; clamped to `0` when read.
    current_pending: AtomicI64,
}

/// A consistent-enough point-in-time snapshot of a bus's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_messages_written: u64,
    pub total_messages_read: u64,
    pub total_bytes_written: u64,
    pub total_bytes_read: u64,
    pub failed_writes: u64,
    pub failed_reads: u64,
    pub dropped_corrupt: u64,
    pub peak_pending: u64,
    pub current_pending: u64,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self, payload_len: usize) {
        self.total_messages_written.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_written.fetch_add(payload_len as u64, Ordering::Relaxed);
        let pending = self.current_pending.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_pending.fetch_max(pending.max(0) as u64, Ordering::Relaxed);
    }

    pub fn record_failed_write(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self, payload_len: usize) {
        self.total_messages_read.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_read.fetch_add(payload_len as u64, Ordering::Relaxed);
        self.current_pending.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_failed_read(&self) {
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_corrupt(&self) {
        self.dropped_corrupt.fetch_add(1, Ordering::Relaxed);
        self.current_pending.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_messages_written: self.total_messages_written.load(Ordering::Relaxed),
            total_messages_read: self.total_messages_read.load(Ordering::Relaxed),
            total_bytes_written: self.total_bytes_written.load(Ordering::Relaxed),
            total_bytes_read: self.total_bytes_read.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            dropped_corrupt: self.dropped_corrupt.load(Ordering::Relaxed),
            peak_pending: self.peak_pending.load(Ordering::Relaxed),
            current_pending: self.current_pending.load(Ordering::Relaxed).max(0) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_balances_pending() {
        let stats = Stats::new();
        stats.record_write(10);
        stats.record_write(20);
        let snap = stats.snapshot();
        assert_eq!(snap.total_messages_written, 2);
        assert_eq!(snap.current_pending, 2);

        stats.record_read(10);
        let snap = stats.snapshot();
        assert_eq!(snap.total_messages_read, 1);
        assert_eq!(snap.current_pending, 1);
    }

    #[test]
    fn peak_pending_tracks_the_high_water_mark() {
        let stats = Stats::new();
        stats.record_write(1);
        stats.record_write(1);
        stats.record_read(1);
        stats.record_write(1);
        let snap = stats.snapshot();
        assert_eq!(snap.peak_pending, 2);
        assert_eq!(snap.current_pending, 2);
    }

    #[test]
    fn corrupt_drop_decrements_pending_and_counts_separately() {
        let stats = Stats::new();
        stats.record_write(5);
        stats.record_dropped_corrupt();
        let snap = stats.snapshot();
        assert_eq!(snap.dropped_corrupt, 1);
        assert_eq!(snap.current_pending, 0);
    }
}
