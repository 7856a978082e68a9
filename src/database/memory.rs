//! In-process table with simulated latency and a fault switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, warn};

use super::{KeyValueStore, Record, StoreError, StoreFuture};

/// Behaviour knobs for [`InMemoryTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Fixed delay added to every read.
    pub latency: Duration,
    /// Upper bound of a random extra delay added to every read.
    pub jitter: Duration,
    /// When set, every read fails with [`StoreError::Unavailable`].
    pub fault_injection: bool,
}

/// Concurrent in-memory table keyed by record id.
///
/// Counts reads and writes so callers can observe how often the cache let a
/// request through.
#[derive(Debug, Default)]
pub struct InMemoryTable {
    rows: RwLock<HashMap<String, Record>>,
    latency: Duration,
    jitter: Duration,
    faulty: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            latency: options.latency,
            jitter: options.jitter,
            faulty: AtomicBool::new(options.fault_injection),
            ..Self::default()
        }
    }

    /// Number of `get` calls served so far, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Flips fault injection at runtime.
    pub fn set_fault_injection(&self, on: bool) {
        self.faulty.store(on, Ordering::SeqCst);
    }

    fn read_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=self.jitter);
        self.latency + extra
    }
}

impl KeyValueStore for InMemoryTable {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Record>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);

            let delay = self.read_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if self.faulty.load(Ordering::SeqCst) {
                warn!(key, "fault injection enabled, failing read");
                return Err(StoreError::Unavailable("fault injection enabled".into()));
            }

            let record = self.rows.read().get(key).cloned();
            debug!(key, found = record.is_some(), ?delay, "store read");
            Ok(record)
        })
    }

    fn put(&self, record: Record) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if record.id.is_empty() {
                return Err(StoreError::Rejected("record id must not be empty".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows.write().insert(record.id.clone(), record);
            Ok(())
        })
    }
}
