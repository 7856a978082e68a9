//! Lock-free cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    timeouts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        impl CacheStats {
            $(
                pub(crate) fn $record(&self, n: u64) {
                    self.$field.fetch_add(n, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter! {
    record_hit => hits,
    record_miss => misses,
    record_coalesced => coalesced,
    record_load => loads,
    record_load_failure => load_failures,
    record_timeout => timeouts,
    record_eviction => evictions,
    record_expiration => expirations,
    record_invalidation => invalidations,
}

impl CacheStats {
    pub(crate) fn snapshot(&self, entries: usize, in_flight: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries,
            in_flight,
        }
    }
}

/// Point-in-time view of the cache counters, served at `GET /cache/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    /// Lookups that started a load.
    pub misses: u64,
    /// Lookups that attached to a load already in flight.
    pub coalesced: u64,
    /// Loads that completed successfully.
    pub loads: u64,
    pub load_failures: u64,
    pub timeouts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub in_flight: usize,
}

impl StatsSnapshot {
    /// Fraction of lookups answered without waiting on the backing store.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses + self.coalesced;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
