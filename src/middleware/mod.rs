//! Middleware pipeline: composable before/after request handler logic.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; the route handler sits at the end.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`]: converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`LoggerMiddleware`]: one structured log line per request.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context, router::Handler};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`Next::run`], so each middleware can forward a
/// request at most once. When every middleware has run, the matched route
/// handler (or the router's 404 fallback) produces the response.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use movie_cache::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Which middleware to invoke on the next `run` call.
    index: usize,
    endpoint: Handler,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a cursor at the start of `middlewares`, terminating in `endpoint`.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        if let Some(handler) = self.middlewares.get(self.index).cloned() {
            self.index += 1;
            handler(ctx, self).await
        } else {
            (self.endpoint)(ctx).await
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass through (`next.run(ctx).await`), short-circuit by
/// returning a [`Response`] without calling `next`, or decorate the
/// downstream response. Implementations must be `Send + Sync` because the
/// chain is shared across Tokio tasks.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs method, path, matched route, status, cache status and duration for
/// every request at `info`.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_owned();
            let route = ctx.matched_route().unwrap_or("-").to_owned();

            let response = next.run(ctx).await;

            let cache = response.headers().get("x-cache").unwrap_or("-");
            tracing::info!(
                %method,
                %path,
                %route,
                status = response.status().as_u16(),
                cache,
                elapsed = ?start.elapsed(),
                "request served"
            );

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, StatusCode};

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Trail", tag);
                response
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn handle(&self, _: Context, _: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::BadRequest) })
        }
    }

    fn ctx() -> Context {
        let (req, _) = Request::parse(b"GET /cache/stats HTTP/1.1\r\n\r\n").unwrap();
        Context::new(req)
    }

    fn endpoint() -> Handler {
        Arc::new(
            |_ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
                Box::pin(async { Response::new(StatusCode::Ok) })
            },
        )
    }

    #[tokio::test]
    async fn chain_unwinds_inside_out() {
        let chain: Arc<[MiddlewareHandler]> = Arc::from(vec![
            from_middleware(Arc::new(Tag("outer"))),
            from_middleware(Arc::new(Tag("inner"))),
            from_middleware(Arc::new(LoggerMiddleware)),
        ]);
        let response = Next::new(chain, endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::Ok);
        let trail: Vec<_> = response.headers().get_all("x-trail").collect();
        assert_eq!(trail, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let chain: Arc<[MiddlewareHandler]> = Arc::from(vec![
            from_middleware(Arc::new(Tag("outer"))),
            from_middleware(Arc::new(Reject)),
        ]);
        let response = Next::new(chain, endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(response.headers().get("x-trail"), Some("outer"));
    }
}
