//! Backing store: the key-value table the cache reads through to.
//!
//! [`KeyValueStore`] is the seam between the HTTP side and storage. The crate
//! ships [`InMemoryTable`]; anything that can answer `get`/`put` by string key
//! can stand in for it. [`MovieRepository`] wraps a store with id validation
//! and typed not-found results, and [`seed`] loads the sample catalogue.

mod memory;
mod movies;
pub mod seed;

use std::collections::BTreeMap;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{InMemoryTable, StoreOptions};
pub use movies::{Lookup, MovieId, MovieRepository, ValidationError};

/// One row of the table: a string key plus free-form string attributes.
///
/// Serialises flat, so `{"id": "3", "title": "..."}` rather than nesting the
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Failures talking to the backing store. Cloneable so one failed load can be
/// handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("record rejected: {0}")]
    Rejected(String),
}

/// Boxed future returned by [`KeyValueStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Minimal async key-value interface.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Fetches the record stored under `key`, or `None` if there is none.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Record>>;

    /// Inserts or replaces `record` under its id.
    fn put(&self, record: Record) -> StoreFuture<'_, ()>;
}
