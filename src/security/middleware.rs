use std::pin::Pin;

use crate::{
    Method, Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

/// Request headers a browser client may send to the movie API. `cache-control`
/// is listed so clients can ask the cached route for a refresh.
const DEFAULT_ALLOWED_HEADERS: [&str; 4] =
    ["cache-control", "Content-Type", "Authorization", "X-Movie-Id"];

/// CORS middleware.
///
/// - Requests without an `Origin`, or with an origin outside the allow-list,
///   pass through untouched.
/// - `OPTIONS` preflights are answered with `204 No Content` and never reach
///   the router's handlers.
/// - Other responses get `Access-Control-Allow-*` headers appended, plus
///   `Vary: Origin` when a specific origin is echoed back.
///
/// # Examples
///
/// ```rust,no_run
/// use movie_cache::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .allow_origin("https://dashboard.example.com")
///     .allow_header("X-Request-Id");
/// ```
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Read-only defaults: no origins, `GET`/`DELETE`/`OPTIONS`, and the
    /// headers in [`DEFAULT_ALLOWED_HEADERS`].
    pub fn new() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "DELETE", "OPTIONS"].map(String::from).to_vec(),
            allowed_headers: DEFAULT_ALLOWED_HEADERS.map(String::from).to_vec(),
        }
    }

    /// Adds an allowed origin; `"*"` accepts every origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.allowed_headers.push(header.into());
        self
    }

    fn resolve_origin(&self, origin: &str) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_owned())
        } else {
            self.allowed_origins
                .iter()
                .find(|o| o.as_str() == origin)
                .cloned()
        }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let allow_origin = ctx
            .request()
            .headers()
            .get("origin")
            .and_then(|origin| self.resolve_origin(origin));
        let methods = self.allowed_methods.join(", ");
        let headers = self.allowed_headers.join(", ");

        Box::pin(async move {
            let Some(allow_origin) = allow_origin else {
                return next.run(ctx).await;
            };
            let vary = allow_origin != "*";

            let mut resp = if ctx.request().method() == &Method::Options {
                Response::new(StatusCode::NoContent).header("Access-Control-Max-Age", "3600")
            } else {
                next.run(ctx).await
            };

            resp.add_header("Access-Control-Allow-Origin", allow_origin);
            resp.add_header("Access-Control-Allow-Methods", methods);
            resp.add_header("Access-Control-Allow-Headers", headers);
            if vary {
                resp.add_header("Vary", "Origin");
            }
            resp
        })
    }
}
