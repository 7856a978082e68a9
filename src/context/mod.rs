//! Per-request context: the parsed request, captured path parameters, and a
//! type-keyed extension map that middleware and the router use to pass
//! request-scoped facts downstream.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::Request;

/// Type-erased request extensions map.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The route template that matched the request, e.g. `/cached/movie/{id}`.
///
/// Inserted by the router before the middleware chain runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

/// Per-request context handed to middleware and handlers.
pub struct Context {
    request: Request,
    params: Parameters,
    extensions: Extensions,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self::with_params(request, Parameters::new())
    }

    pub fn with_params(request: Request, params: Parameters) -> Self {
        Self {
            request,
            params,
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Template of the matched route, or `None` for unmatched requests.
    pub fn matched_route(&self) -> Option<&str> {
        self.extensions
            .get::<MatchedRoute>()
            .map(|route| route.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn extensions_are_keyed_by_type() {
        let mut ext = Extensions::new();
        ext.insert(Marker(1));
        ext.insert(MatchedRoute("/cached/movie/{id}".into()));
        ext.insert(Marker(2));
        assert_eq!(ext.get::<Marker>(), Some(&Marker(2)));
        assert_eq!(ext.remove::<Marker>(), Some(Marker(2)));
        assert!(ext.get::<Marker>().is_none());
        assert!(ext.get::<MatchedRoute>().is_some());
    }

    #[test]
    fn context_exposes_matched_route() {
        let (req, _) = Request::parse(b"GET /cached/movie/1 HTTP/1.1\r\n\r\n").unwrap();
        let mut params = Parameters::new();
        params.insert("id".into(), "1".into());
        let mut ctx = Context::with_params(req, params);
        assert_eq!(ctx.matched_route(), None);
        ctx.extensions_mut()
            .insert(MatchedRoute("/cached/movie/{id}".into()));
        assert_eq!(ctx.matched_route(), Some("/cached/movie/{id}"));
        assert_eq!(ctx.params().get("id"), Some("1"));
    }
}
