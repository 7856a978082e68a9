//! Read-through response cache.
//!
//! [`ReadThroughCache`] sits between the API routes and the backing store. A
//! lookup is answered from memory while the entry is younger than its TTL;
//! otherwise exactly one loader call is made per key no matter how many
//! requests arrive while it runs, and every one of them receives its result.
//!
//! Keys come from a [`CacheKeySpec`], which names the request fields that
//! identify a response (for the movie routes, just the `id` path segment).
//!
//! ## Settings
//!
//! | Setting         | Default | Effect                                     |
//! |-----------------|---------|--------------------------------------------|
//! | `ttl`           | 30s     | entries older than this are reloaded       |
//! | `capacity`      | 1024    | least-recently-used entries are evicted    |
//! | `fetch_timeout` | none    | waiters get [`CacheError::Timeout`]        |

mod config;
mod engine;
mod key;
mod stats;

pub use config::CacheConfig;
pub use engine::{CacheError, CacheStatus, Cached, ReadThroughCache};
pub use key::{CacheKey, CacheKeySpec, KeyError, KeySource, Normalizer};
pub use stats::StatsSnapshot;
