//! Cache-key derivation.
//!
//! A key is the route template plus the values of every declared cache-key
//! parameter, sorted by name. Nothing else about the request participates, so
//! two requests that agree on those values share an entry whatever their
//! other headers say.

use std::fmt;

use thiserror::Error;

use crate::context::Context;

/// Identity of one cached response.
///
/// # Examples
///
/// ```
/// use movie_cache::cache::CacheKey;
///
/// let a = CacheKey::new("/cached/movie/{id}", [("id", "3")]);
/// let b = CacheKey::new("/cached/movie/{id}", [("id", "3")]);
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "/cached/movie/{id}?id=3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    route: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new<N, V>(route: impl Into<String>, params: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut params: Vec<(String, String)> = params
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        params.sort();
        Self {
            route: route.into(),
            params,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.route)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

/// Where a cache-key parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Path,
    Query,
    Header,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("missing cache-key parameter `{name}` in {location}")]
    MissingParameter { name: String, location: KeySource },

    #[error("cache-key parameter `{name}` has no canonical form for `{value}`")]
    Unnormalizable { name: String, value: String },
}

/// Maps a raw parameter value to its canonical spelling, or `None` if the
/// value has none.
pub type Normalizer = fn(&str) -> Option<String>;

#[derive(Debug, Clone)]
struct KeyParam {
    name: String,
    location: KeySource,
    normalize: Option<Normalizer>,
}

/// Declares which request fields make up the cache key for one route.
///
/// Values that name the same resource under different spellings must be
/// folded with [`normalized`](Self::normalized), or they get separate entries.
///
/// ```
/// use movie_cache::cache::CacheKeySpec;
///
/// let spec = CacheKeySpec::new("/cached/movie/{id}")
///     .path_param("id")
///     .normalized(|raw| raw.trim().parse::<u8>().ok().map(|n| n.to_string()));
/// assert_eq!(spec.route(), "/cached/movie/{id}");
/// ```
#[derive(Debug, Clone)]
pub struct CacheKeySpec {
    route: String,
    params: Vec<KeyParam>,
}

impl CacheKeySpec {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn path_param(self, name: impl Into<String>) -> Self {
        self.with(name.into(), KeySource::Path)
    }

    #[must_use]
    pub fn query_param(self, name: impl Into<String>) -> Self {
        self.with(name.into(), KeySource::Query)
    }

    /// Header names are matched case-insensitively and stored lowercased.
    #[must_use]
    pub fn header(self, name: impl Into<String>) -> Self {
        self.with(name.into().to_ascii_lowercase(), KeySource::Header)
    }

    /// Canonicalises the most recently declared parameter with `normalize`.
    #[must_use]
    pub fn normalized(mut self, normalize: Normalizer) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.normalize = Some(normalize);
        }
        self
    }

    fn with(mut self, name: String, location: KeySource) -> Self {
        self.params.push(KeyParam {
            name,
            location,
            normalize: None,
        });
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Builds the key for `ctx`. Every declared parameter must be present.
    pub fn derive(&self, ctx: &Context) -> Result<CacheKey, KeyError> {
        let request = ctx.request();
        let mut values = Vec::with_capacity(self.params.len());

        for param in &self.params {
            let value = match param.location {
                KeySource::Path => ctx.params().get(&param.name),
                KeySource::Query => request.query_param(&param.name),
                KeySource::Header => request.headers().get(&param.name).map(str::trim),
            };
            let value = value.ok_or_else(|| KeyError::MissingParameter {
                name: param.name.clone(),
                location: param.location,
            })?;
            let value = match param.normalize {
                Some(normalize) => {
                    normalize(value).ok_or_else(|| KeyError::Unnormalizable {
                        name: param.name.clone(),
                        value: value.to_owned(),
                    })?
                }
                None => value.to_owned(),
            };
            values.push((param.name.clone(), value));
        }

        Ok(CacheKey::new(self.route.clone(), values))
    }
}
