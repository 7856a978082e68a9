//! Cache engine settings.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(30);
const DEFAULT_CAPACITY: usize = 1024;

/// Tunables for a [`ReadThroughCache`](super::ReadThroughCache).
///
/// | Setting         | Default   |
/// |-----------------|-----------|
/// | `ttl`           | 30s       |
/// | `capacity`      | 1024      |
/// | `fetch_timeout` | none      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of an entry, counted from the moment its load completed.
    pub ttl: Duration,
    /// Maximum number of entries before least-recently-used eviction.
    pub capacity: NonZeroUsize,
    /// Deadline applied to each loader call unless the caller supplies one.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            fetch_timeout: None,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the entry bound; zero is clamped to one.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}
