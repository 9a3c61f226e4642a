//! Buffer pool counters.
//!
//! A handful of relaxed atomics the pool bumps on its hot paths, so an
//! index workload can be characterized (did that scan run hot out of
//! the pool, or did it churn frames?) without adding a lock anywhere.
//! Relaxed ordering suffices: each counter stands alone and is only
//! ever read as an approximate running total.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one buffer pool.
///
/// Fields are public atomics; the pool increments them directly and
/// callers read them through [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct BufferPoolStats {
    /// Fetches satisfied from a resident frame.
    pub cache_hits: AtomicU64,

    /// Fetches that had to go to disk.
    pub cache_misses: AtomicU64,

    /// Frames reclaimed from a resident page.
    pub evictions: AtomicU64,

    /// Pages read from disk.
    pub pages_read: AtomicU64,

    /// Pages written back to disk.
    pub pages_written: AtomicU64,
}

impl BufferPoolStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            pages_read: AtomicU64::new(0),
            pages_written: AtomicU64::new(0),
        }
    }

    /// Fraction of fetches served from the pool, 0.0 when nothing has
    /// been fetched yet.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy the counters into a plain, comparable value.
    ///
    /// The copy is not a consistent cut across counters; concurrent
    /// operations may land between the loads.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.pages_read.store(0, Ordering::Relaxed);
        self.pages_written.store(0, Ordering::Relaxed);
    }
}

impl Default for BufferPoolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A plain copy of the counters, safe to print and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served from the pool at snapshot time.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {}, misses: {}, evictions: {}, read: {}, written: {}, hit_rate: {:.2}%",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 0);
        assert_eq!(stats.cache_misses.load(Ordering::Relaxed), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = BufferPoolStats::new();

        stats.cache_hits.fetch_add(7, Ordering::Relaxed);
        stats.cache_misses.fetch_add(3, Ordering::Relaxed);

        assert_eq!(stats.hit_rate(), 0.7);
    }

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(7, Ordering::Relaxed);
        stats.cache_misses.fetch_add(3, Ordering::Relaxed);
        stats.pages_written.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 7);
        assert_eq!(snapshot.cache_misses, 3);
        assert_eq!(snapshot.pages_written, 2);
        assert_eq!(snapshot.hit_rate(), 0.7);

        // The snapshot does not track later updates
        stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        assert_eq!(snapshot.cache_hits, 7);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(100, Ordering::Relaxed);
        stats.evictions.fetch_add(4, Ordering::Relaxed);

        stats.reset();

        assert_eq!(stats.snapshot(), BufferPoolStats::new().snapshot());
    }

    #[test]
    fn test_display_format() {
        let stats = BufferPoolStats::new();
        stats.cache_hits.fetch_add(80, Ordering::Relaxed);
        stats.cache_misses.fetch_add(20, Ordering::Relaxed);
        stats.evictions.fetch_add(5, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());

        assert!(display.contains("hits: 80"));
        assert!(display.contains("misses: 20"));
        assert!(display.contains("80.00%"));
    }
}
