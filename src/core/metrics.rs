//! Logger metrics
//!
//! Counters shared by every logger of a registry: what reached a sink, what
//! failed, and what deduplication held back.

use std::sync::atomic::{AtomicU64, Ordering};

/// # Example
///
/// ```
/// use fm_log::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_written(2);
/// metrics.record_repeat();
///
/// assert_eq!(metrics.lines_written(), 2);
/// assert_eq!(metrics.repeats_suppressed(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Physical lines handed to a sink successfully
    lines_written: AtomicU64,

    /// Sink writes that returned an error or panicked
    write_failures: AtomicU64,

    /// Calls swallowed because they repeated the previous emission
    repeats_suppressed: AtomicU64,

    /// Writes handed to the deferred writer
    deferred_writes: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            lines_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            repeats_suppressed: AtomicU64::new(0),
            deferred_writes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn repeats_suppressed(&self) -> u64 {
        self.repeats_suppressed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn deferred_writes(&self) -> u64 {
        self.deferred_writes.load(Ordering::Relaxed)
    }

    /// Record `lines` written in one sink write. Returns the previous total.
    #[inline]
    pub fn record_written(&self, lines: u64) -> u64 {
        self.lines_written.fetch_add(lines, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_repeat(&self) -> u64 {
        self.repeats_suppressed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_deferred(&self) -> u64 {
        self.deferred_writes.fetch_add(1, Ordering::Relaxed)
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.lines_written.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.repeats_suppressed.store(0, Ordering::Relaxed);
        self.deferred_writes.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            lines_written: AtomicU64::new(self.lines_written()),
            write_failures: AtomicU64::new(self.write_failures()),
            repeats_suppressed: AtomicU64::new(self.repeats_suppressed()),
            deferred_writes: AtomicU64::new(self.deferred_writes()),
        }
    }
}
