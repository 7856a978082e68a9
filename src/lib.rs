//! # movie-cache
//!
//! A small movie API served over a from-scratch Tokio HTTP/1.1 stack, with a
//! read-through response cache between the routes and the backing store.
//!
//! - `GET /cached/movie/{id}` answers from the cache while the entry is fresh.
//!   Concurrent misses for one id share a single store read.
//! - `GET /uncached/movie` always reads the store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use movie_cache::api::{AppState, MovieCache, RouteOptions, build_router};
//! use movie_cache::cache::CacheConfig;
//! use movie_cache::database::seed::{DataLoader, LoadEvent};
//! use movie_cache::database::{InMemoryTable, KeyValueStore, MovieRepository};
//! use movie_cache::{Request, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryTable::new());
//!     DataLoader::new(Arc::clone(&store)).handle(LoadEvent::Create).await?;
//!
//!     let state = AppState::new(
//!         MovieCache::new(CacheConfig::default()),
//!         MovieRepository::new(store),
//!         RouteOptions::default(),
//!     );
//!     let router = Arc::new(build_router(Arc::new(state)));
//!
//!     Server::bind("127.0.0.1:8080")
//!         .await?
//!         .run(move |req: Request| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;
pub mod telemetry;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
