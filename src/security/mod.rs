//! Browser-facing security headers.
//!
//! - [`CorsMiddleware`]: `Access-Control-*` injection and preflight handling,
//!   so the movie API can be called from a browser-based load dashboard.

mod middleware;

pub use middleware::CorsMiddleware;
