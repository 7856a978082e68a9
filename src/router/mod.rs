//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! Three pattern styles are supported:
//!
//! | Pattern                | Example match              | Captured params                 |
//! |------------------------|----------------------------|---------------------------------|
//! | `/uncached/movie`      | `/uncached/movie`          | *(none)*                        |
//! | `/cached/movie/{id}`   | `/cached/movie/3`          | `id → "3"`                      |
//! | `/cached/movie/:id`    | `/cached/movie/3`          | `id → "3"`                      |
//! | `/files/*`             | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order; the first route whose method and
//! pattern both match wins. Every request, matched or not, passes through the
//! middleware chain registered with [`Router::layer`].

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, MatchedRoute, Parameters};
use crate::middleware::{MiddlewareHandler, Next};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

fn into_handler(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// `:name` and `{name}` both declare a capture.
fn parameter_name(segment: &str) -> Option<&str> {
    segment.strip_prefix(':').or_else(|| {
        segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
    })
}

impl Pattern {
    /// Compile a pattern: `/*` suffix → wildcard, any capture segment →
    /// parameterized, otherwise exact.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        let segments: Vec<Segment> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match parameter_name(s) {
                Some(name) => Segment::Parameter(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();

        if segments
            .iter()
            .any(|seg| matches!(seg, Segment::Parameter(_)))
        {
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Parameters::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), path_seg.to_string());
                        }
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                // The prefix must end on a segment boundary.
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = Parameters::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    template: String,
    pattern: Pattern,
    handler: Handler,
}

/// HTTP request router.
///
/// Unmatched paths get `404 Not Found`; a path that matches some route under a
/// different method gets `405 Method Not Allowed`.
///
/// # Examples
///
/// ```rust,no_run
/// use movie_cache::{Router, Response, StatusCode, context::Context};
///
/// let mut router = Router::new();
/// router.get("/cached/movie/{id}", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or("?").to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
pub struct Router {
    routes: Vec<Route>,
    middlewares: Arc<[MiddlewareHandler]>,
    not_found: Handler,
    method_not_allowed: Handler,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middlewares: Arc::from(Vec::new()),
            not_found: into_handler(|_ctx: Context| async { Response::new(StatusCode::NotFound) }),
            method_not_allowed: into_handler(|_ctx: Context| async {
                Response::new(StatusCode::MethodNotAllowed)
            }),
        }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Delete, path, handler);
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.routes.push(Route {
            method,
            template: path.to_owned(),
            pattern: Pattern::parse(path),
            handler: into_handler(handler),
        });
    }

    /// Append a middleware. The first layer added is the outermost.
    pub fn layer(&mut self, middleware: MiddlewareHandler) {
        let mut chain = self.middlewares.to_vec();
        chain.push(middleware);
        self.middlewares = chain.into();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` through the middleware chain to the first matching route.
    pub async fn route(&self, request: Request) -> Response {
        let mut path_matched = false;
        let mut resolved = None;

        for route in &self.routes {
            if let Some(params) = route.pattern.matches(request.path()) {
                if &route.method == request.method() {
                    resolved = Some((route, params));
                    break;
                }
                path_matched = true;
            }
        }

        let (endpoint, ctx) = match resolved {
            Some((route, params)) => {
                let mut ctx = Context::with_params(request, params);
                ctx.extensions_mut()
                    .insert(MatchedRoute(route.template.clone()));
                (route.handler.clone(), ctx)
            }
            None if path_matched => (self.method_not_allowed.clone(), Context::new(request)),
            None => (self.not_found.clone(), Context::new(request)),
        };

        Next::new(Arc::clone(&self.middlewares), endpoint)
            .run(ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{LoggerMiddleware, from_middleware};

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn body(response: &Response) -> &str {
        std::str::from_utf8(response.body_bytes()).unwrap()
    }

    #[test]
    fn braces_and_colons_both_capture() {
        for template in ["/cached/movie/{id}", "/cached/movie/:id"] {
            let params = Pattern::parse(template).matches("/cached/movie/3").unwrap();
            assert_eq!(params.get("id"), Some("3"));
        }
    }

    #[test]
    fn exact_patterns_normalize_trailing_slash() {
        let pat = Pattern::parse("/uncached/movie/");
        assert!(matches!(&pat, Pattern::Exact(s) if s == "/uncached/movie"));
        assert!(pat.matches("/uncached/movie/").is_some());
        assert!(pat.matches("/uncached/movies").is_none());
    }

    #[test]
    fn root_only_matches_root() {
        let pat = Pattern::parse("/");
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/cached").is_none());
    }

    #[test]
    fn segment_count_must_agree() {
        let pat = Pattern::parse("/cached/movie/{id}");
        assert!(pat.matches("/cached/movie").is_none());
        assert!(pat.matches("/cached/movie/3/extra").is_none());
        assert!(pat.matches("/uncached/movie/3").is_none());
    }

    #[test]
    fn unterminated_brace_is_static() {
        let pat = Pattern::parse("/movie/{id");
        assert!(matches!(pat, Pattern::Exact(_)));
    }

    #[test]
    fn wildcard_captures_suffix() {
        let params = Pattern::parse("/files/*")
            .matches("/files/docs/readme.txt")
            .unwrap();
        assert_eq!(params.get("wildcard"), Some("/docs/readme.txt"));
    }

    #[test]
    fn wildcard_stops_at_segment_boundary() {
        let pat = Pattern::parse("/files/*");
        assert!(pat.matches("/filesX").is_none());
        assert!(pat.matches("/files-old/a").is_none());
        assert_eq!(pat.matches("/files").unwrap().get("wildcard"), Some(""));
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        assert!(router.is_empty());
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_returns_405() {
        let mut router = Router::new();
        router.get("/cache/stats", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/cache/stats")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn same_path_different_methods() {
        let mut router = Router::new();
        router.get("/cache/movie/{id}", |_ctx: Context| async {
            Response::new(StatusCode::Ok).body("get")
        });
        router.delete("/cache/movie/{id}", |_ctx: Context| async {
            Response::new(StatusCode::Ok).body("delete")
        });
        assert_eq!(router.len(), 2);
        let res = router.route(make_request("DELETE", "/cache/movie/4")).await;
        assert_eq!(body(&res), "delete");
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/cached/movie/{id}", |_ctx: Context| async {
            Response::new(StatusCode::Ok).body("param")
        });
        router.get("/cached/movie/3", |_ctx: Context| async {
            Response::new(StatusCode::Ok).body("exact")
        });
        let res = router.route(make_request("GET", "/cached/movie/3")).await;
        assert_eq!(body(&res), "param");
    }

    #[tokio::test]
    async fn handler_sees_params_and_template() {
        let mut router = Router::new();
        router.layer(from_middleware(Arc::new(LoggerMiddleware)));
        router.get("/cached/movie/{id}", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or("").to_owned();
            let route = ctx.matched_route().unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(format!("{route} {id}"))
        });
        let res = router.route(make_request("GET", "/cached/movie/9")).await;
        assert_eq!(body(&res), "/cached/movie/{id} 9");
    }
}
