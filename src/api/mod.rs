//! HTTP surface of the movie service.
//!
//! | Method   | Path                  | Behaviour                                   |
//! |----------|-----------------------|---------------------------------------------|
//! | `GET`    | `/cached/movie/{id}`  | read through the cache, keyed on `id`       |
//! | `GET`    | `/cached/movie`       | no id to key on, so straight to the store   |
//! | `GET`    | `/uncached/movie`     | always hits the store                       |
//! | `GET`    | `/cache/stats`        | cache counters as JSON                      |
//! | `DELETE` | `/cache/movie/{id}`   | drop the cached response for `id`           |
//!
//! Movie responses share one shape whichever path served them and carry an
//! `X-Cache` header (`HIT`, `MISS`, `COALESCED` or `BYPASS`) plus `Age`.

mod format;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use crate::Router;
use crate::cache::{CacheKey, CacheKeySpec, KeyError, ReadThroughCache};
use crate::context::Context;
use crate::database::{Lookup, MovieId, MovieRepository, StoreError};

pub use format::{FormatError, GREETING, MovieField, MovieResponse, Outcome, format};

pub const CACHED_ROUTE: &str = "/cached/movie/{id}";
pub const CACHED_NO_ID_ROUTE: &str = "/cached/movie";
pub const UNCACHED_ROUTE: &str = "/uncached/movie";
pub const STATS_ROUTE: &str = "/cache/stats";
pub const INVALIDATE_ROUTE: &str = "/cache/movie/{id}";

/// Header a client may use to pick a movie on the uncached route.
pub const MOVIE_ID_HEADER: &str = "X-Movie-Id";

/// The cache behind [`CACHED_ROUTE`]. Not-found lookups are cached like
/// found ones; store failures never are.
pub type MovieCache = ReadThroughCache<CacheKey, Lookup, StoreError>;

/// Per-route behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOptions {
    /// When off, the cached route reads the store directly.
    pub cache_enabled: bool,
    /// Answer invalid ids with 400 rather than 200 and a message.
    pub strict_validation: bool,
    /// Honour `Cache-Control: max-age=0` / `no-cache` on the cached route.
    pub allow_client_refresh: bool,
    /// Deadline for one store read on any route.
    pub fetch_timeout: Option<Duration>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            strict_validation: false,
            allow_client_refresh: false,
            fetch_timeout: Some(Duration::from_secs(3)),
        }
    }
}

/// State shared by every handler; built once at startup.
pub struct AppState {
    pub cache: MovieCache,
    pub repository: MovieRepository,
    pub options: RouteOptions,
    key_spec: CacheKeySpec,
}

impl AppState {
    pub fn new(cache: MovieCache, repository: MovieRepository, options: RouteOptions) -> Self {
        Self {
            cache,
            repository,
            options,
            key_spec: CacheKeySpec::new(CACHED_ROUTE)
                .path_param("id")
                .normalized(canonical_id),
        }
    }

    /// The cache key for the `{id}` captured in `ctx`. Every spelling of one
    /// movie id (`3`, `03`, `+3`) maps to the same key, so the cached route
    /// and `DELETE /cache/movie/{id}` agree on it.
    pub fn cache_key(&self, ctx: &Context) -> Result<CacheKey, KeyError> {
        self.key_spec.derive(ctx)
    }
}

fn canonical_id(raw: &str) -> Option<String> {
    MovieId::parse(raw).ok().map(MovieId::key)
}

/// Builds the router with every movie and cache route registered.
///
/// Middleware is left to the caller so tests can run the bare routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    let s = Arc::clone(&state);
    router.get(CACHED_ROUTE, move |ctx: Context| {
        handlers::cached_movie(Arc::clone(&s), ctx)
    });

    let s = Arc::clone(&state);
    router.get(CACHED_NO_ID_ROUTE, move |ctx: Context| {
        handlers::uncached_movie(Arc::clone(&s), ctx)
    });

    let s = Arc::clone(&state);
    router.get(UNCACHED_ROUTE, move |ctx: Context| {
        handlers::uncached_movie(Arc::clone(&s), ctx)
    });

    let s = Arc::clone(&state);
    router.get(STATS_ROUTE, move |ctx: Context| {
        handlers::cache_stats(Arc::clone(&s), ctx)
    });

    let s = state;
    router.delete(INVALIDATE_ROUTE, move |ctx: Context| {
        handlers::invalidate(Arc::clone(&s), ctx)
    });

    router
}
