//! The read-through cache itself.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::stats::{CacheStats, StatsSnapshot};

/// Why a lookup produced no value. Every waiter on a load sees the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    #[error("load failed: {0}")]
    Load(E),

    #[error("load timed out after {0:?}")]
    Timeout(Duration),

    #[error("load task ended without producing a result")]
    Aborted,
}

/// How a lookup was answered; surfaced to clients as `X-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh entry.
    Hit,
    /// This caller started the load.
    Miss,
    /// This caller waited on a load another caller started.
    Coalesced,
    /// The cache was not consulted.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Coalesced => "COALESCED",
            Self::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value handed back to a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    /// Wall-clock time the value was loaded from the backing store.
    pub fetched_at: OffsetDateTime,
    /// Time since the entry was stored; zero for the caller that loaded it.
    pub age: Duration,
    pub status: CacheStatus,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: OffsetDateTime,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V: Clone> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at: OffsetDateTime::now_utc(),
            inserted_at: Instant::now(),
            ttl,
        }
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }

    fn to_cached(&self, now: Instant, status: CacheStatus) -> Cached<V> {
        Cached {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            age: self.age(now),
            status,
        }
    }
}

type Outcome<V, E> = Result<CacheEntry<V>, CacheError<E>>;
type Slot<V, E> = watch::Receiver<Option<Outcome<V, E>>>;

// Marker for a load in progress. `id` tells a finishing load whether the
// marker is still its own or was detached by `invalidate`/`clear`.
struct Flight<V, E> {
    id: u64,
    slot: Slot<V, E>,
}

struct State<K, V, E> {
    entries: LruCache<K, CacheEntry<V>>,
    in_flight: HashMap<K, Flight<V, E>>,
}

struct Inner<K, V, E> {
    state: Mutex<State<K, V, E>>,
    config: CacheConfig,
    stats: CacheStats,
    next_flight: AtomicU64,
}

enum Lookup<V, E> {
    Hit(Cached<V>),
    Wait(Slot<V, E>, CacheStatus),
}

/// In-memory read-through cache with TTL expiry, LRU capacity bound, and
/// single-flight loading.
///
/// Entries and in-flight markers live in one table behind one mutex, so the
/// "is it cached / is it loading / start loading" decision is atomic per
/// lookup. The mutex is never held across an `.await`.
///
/// Loads run on their own Tokio task: a caller that gives up waiting does not
/// cancel the load, and the result still lands in the cache for later callers.
///
/// Cloning is cheap and every clone shares the same table.
///
/// # Examples
///
/// ```
/// use movie_cache::cache::{CacheConfig, CacheStatus, ReadThroughCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: ReadThroughCache<String, String, String> =
///     ReadThroughCache::new(CacheConfig::default());
///
/// let first = cache
///     .get("3".to_owned(), || async { Ok("Thor: The Dark World".to_owned()) })
///     .await
///     .unwrap();
/// assert_eq!(first.status, CacheStatus::Miss);
///
/// let second = cache
///     .get("3".to_owned(), || async { Err("not called".to_owned()) })
///     .await
///     .unwrap();
/// assert_eq!(second.status, CacheStatus::Hit);
/// assert_eq!(second.value, "Thor: The Dark World");
/// # }
/// ```
pub struct ReadThroughCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for ReadThroughCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> ReadThroughCache<K, V, E>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: LruCache::new(config.capacity),
                    in_flight: HashMap::new(),
                }),
                config,
                stats: CacheStats::default(),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the value for `key`, loading it with `loader` on a miss.
    ///
    /// Uses the configured `fetch_timeout`. See [`get_with_timeout`](Self::get_with_timeout).
    pub async fn get<F, Fut>(&self, key: K, loader: F) -> Result<Cached<V>, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.get_with_timeout(key, self.inner.config.fetch_timeout, loader)
            .await
    }

    /// Returns the value for `key`, loading it with `loader` on a miss, with an
    /// explicit deadline for the load.
    ///
    /// - A fresh entry is returned immediately and `loader` is not called.
    /// - If no load is running for `key`, `loader` is called exactly once and
    ///   its future is spawned; this caller waits for it.
    /// - If a load is already running, `loader` is dropped uncalled and this
    ///   caller waits for the running load.
    ///
    /// Every waiter on one load receives the same outcome. A failed or timed
    /// out load stores nothing, so the next lookup starts a fresh load. On
    /// timeout the loader task is left running; its late result is discarded.
    pub async fn get_with_timeout<F, Fut>(
        &self,
        key: K,
        timeout: Option<Duration>,
        loader: F,
    ) -> Result<Cached<V>, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (mut slot, status) = match self.lookup_or_start(&key, timeout, loader) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Wait(slot, status) => (slot, status),
        };

        let outcome = match slot.wait_for(Option::is_some).await {
            Ok(published) => (*published).clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(entry)) => Ok(entry.to_cached(Instant::now(), status)),
            Some(Err(e)) => Err(e),
            None => Err(CacheError::Aborted),
        }
    }

    fn lookup_or_start<F, Fut>(&self, key: &K, timeout: Option<Duration>, loader: F) -> Lookup<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let now = Instant::now();
        let stats = &self.inner.stats;
        let mut state = self.inner.state.lock();

        if let Some(entry) = state.entries.get(key) {
            if entry.is_fresh(now) {
                stats.record_hit(1);
                debug!(?key, "cache hit");
                return Lookup::Hit(entry.to_cached(now, CacheStatus::Hit));
            }
            state.entries.pop(key);
            stats.record_expiration(1);
        }

        if let Some(flight) = state.in_flight.get(key) {
            stats.record_coalesced(1);
            debug!(?key, flight = flight.id, "joining in-flight load");
            return Lookup::Wait(flight.slot.clone(), CacheStatus::Coalesced);
        }

        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let (publisher, slot) = watch::channel(None);
        state.in_flight.insert(
            key.clone(),
            Flight {
                id,
                slot: slot.clone(),
            },
        );
        drop(state);

        stats.record_miss(1);
        debug!(?key, flight = id, "cache miss, starting load");
        let guard = FlightGuard {
            inner: &self.inner,
            key,
            id,
            armed: true,
        };
        let load = loader();
        guard.disarm();
        self.spawn_load(key.clone(), id, publisher, timeout, load);
        Lookup::Wait(slot, CacheStatus::Miss)
    }

    fn spawn_load<Fut>(
        &self,
        key: K,
        id: u64,
        publisher: watch::Sender<Option<Outcome<V, E>>>,
        timeout: Option<Duration>,
        load: Fut,
    ) where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let ttl = inner.config.ttl;
            // Separate task so an expired deadline detaches the load instead of dropping it.
            let load = tokio::spawn(load);
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, load).await {
                    Ok(joined) => settle(joined, ttl),
                    Err(_) => Err(CacheError::Timeout(limit)),
                },
                None => settle(load.await, ttl),
            };
            inner.finish(key, id, &publisher, outcome);
        });
    }

    /// Removes `key` and detaches any load in flight for it, so the next
    /// lookup always calls its loader. Callers already waiting on the
    /// detached load still receive its result, but it is not stored.
    ///
    /// Returns `true` if there was anything to remove.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = self.inner.state.lock();
        let removed = state.entries.pop(key).is_some();
        let detached = state.in_flight.remove(key).is_some();
        drop(state);

        if removed || detached {
            self.inner.stats.record_invalidation(1);
            debug!(?key, removed, detached, "invalidated");
        }
        removed || detached
    }

    /// Drops every entry and detaches every in-flight load.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.entries.clear();
        state.in_flight.clear();
    }

    /// Removes expired entries now rather than on their next lookup.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Spawns a task that calls [`purge_expired`](Self::purge_expired) every
    /// `every`. The task exits once the last handle to the cache is dropped.
    pub fn spawn_janitor(&self, every: Duration) -> JoinHandle<()> {
        let every = every.max(Duration::from_millis(1));
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("cache dropped, janitor exiting");
                    break;
                };
                let purged = inner.purge_expired();
                if purged > 0 {
                    debug!(purged, "janitor reclaimed expired entries");
                }
            }
        })
    }

    /// Number of stored entries, fresh or not yet purged.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a load currently registered.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let (entries, in_flight) = {
            let state = self.inner.state.lock();
            (state.entries.len(), state.in_flight.len())
        };
        self.inner.stats.snapshot(entries, in_flight)
    }
}

// Removes a just-registered marker if the loader unwinds before its future
// exists, so later lookups start a new load instead of joining a dead one.
struct FlightGuard<'a, K: Hash + Eq, V, E> {
    inner: &'a Inner<K, V, E>,
    key: &'a K,
    id: u64,
    armed: bool,
}

impl<K: Hash + Eq, V, E> FlightGuard<'_, K, V, E> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<K: Hash + Eq, V, E> Drop for FlightGuard<'_, K, V, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.inner.state.lock();
        if state
            .in_flight
            .get(self.key)
            .is_some_and(|flight| flight.id == self.id)
        {
            state.in_flight.remove(self.key);
        }
    }
}

fn settle<V: Clone, E>(
    joined: Result<Result<V, E>, JoinError>,
    ttl: Duration,
) -> Outcome<V, E> {
    match joined {
        Ok(Ok(value)) => Ok(CacheEntry::new(value, ttl)),
        Ok(Err(e)) => Err(CacheError::Load(e)),
        Err(e) => {
            warn!(error = %e, "loader task panicked or was cancelled");
            Err(CacheError::Aborted)
        }
    }
}

impl<K, V, E> Inner<K, V, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
    E: Clone + fmt::Display,
{
    // Stores a successful result (only if the marker is still ours), clears
    // the marker, then publishes to every waiter. Storing happens before the
    // marker is removed so no lookup can slip between the two and reload.
    fn finish(
        &self,
        key: K,
        id: u64,
        publisher: &watch::Sender<Option<Outcome<V, E>>>,
        outcome: Outcome<V, E>,
    ) {
        match &outcome {
            Ok(_) => self.stats.record_load(1),
            Err(CacheError::Timeout(limit)) => {
                self.stats.record_timeout(1);
                warn!(?key, ?limit, "load timed out");
            }
            Err(e) => {
                self.stats.record_load_failure(1);
                warn!(?key, error = %e, "load failed, nothing cached");
            }
        }

        {
            let mut state = self.state.lock();
            let owns_marker = state
                .in_flight
                .get(&key)
                .is_some_and(|flight| flight.id == id);

            if owns_marker {
                if let Ok(entry) = &outcome {
                    if let Some((evicted, _)) = state.entries.push(key.clone(), entry.clone()) {
                        if evicted != key {
                            self.stats.record_eviction(1);
                            debug!(?evicted, "evicted least-recently-used entry");
                        }
                    }
                }
                state.in_flight.remove(&key);
            } else {
                debug!(?key, flight = id, "load finished after being detached, result not stored");
            }
        }

        publisher.send_replace(Some(outcome));
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        drop(state);

        self.stats.record_expiration(expired.len() as u64);
        expired.len()
    }
}
