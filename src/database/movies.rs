//! Movie lookups over a [`KeyValueStore`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use super::{KeyValueStore, Record, StoreError};

const MAX_ID: u8 = 9;

/// A requested id that cannot name a movie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Choose Movie id between 0 and 9")]
pub struct ValidationError {
    pub input: String,
}

/// A movie id known to be inside the catalogue's range (`0..=9`).
///
/// ```
/// use movie_cache::database::MovieId;
///
/// assert_eq!(MovieId::parse("3").unwrap().get(), 3);
/// assert!(MovieId::parse("10").is_err());
/// assert!(MovieId::parse("three").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieId(u8);

impl MovieId {
    pub fn new(id: u8) -> Result<Self, ValidationError> {
        if id <= MAX_ID {
            Ok(Self(id))
        } else {
            Err(ValidationError {
                input: id.to_string(),
            })
        }
    }

    /// Parses a decimal id. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError {
            input: raw.to_owned(),
        };
        let id: u8 = raw.trim().parse().map_err(|_| invalid())?;
        Self::new(id).map_err(|_| invalid())
    }

    /// Picks an id uniformly from the catalogue range.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..=MAX_ID))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The store key for this id.
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MovieId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Result of a successful store round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Record),
    NotFound(MovieId),
}

/// Typed read adapter over the movie table.
///
/// Taking a [`MovieId`] means an out-of-range request never reaches the store.
#[derive(Clone)]
pub struct MovieRepository {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for MovieRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovieRepository").finish_non_exhaustive()
    }
}

impl MovieRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, id: MovieId) -> Result<Lookup, StoreError> {
        let key = id.key();
        Ok(match self.store.get(&key).await? {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTable;

    #[test]
    fn parse_accepts_the_catalogue_range() {
        for raw in ["0", "9", " 4 ", "03"] {
            assert!(MovieId::parse(raw).is_ok(), "{raw}");
        }
    }

    #[test]
    fn parse_rejects_everything_else() {
        for raw in ["10", "-1", "", "3.5", "256", "abc"] {
            let err = MovieId::parse(raw).unwrap_err();
            assert_eq!(err.input, raw);
            assert_eq!(err.to_string(), "Choose Movie id between 0 and 9");
        }
    }

    #[test]
    fn random_stays_in_range() {
        for _ in 0..200 {
            assert!(MovieId::random().get() <= 9);
        }
    }

    #[tokio::test]
    async fn fetch_distinguishes_found_and_missing() {
        let table = Arc::new(InMemoryTable::new());
        table
            .put(Record::new("3").with("title", "Thor: The Dark World"))
            .await
            .unwrap();
        let repo = MovieRepository::new(table.clone());

        let id = MovieId::parse("3").unwrap();
        match repo.fetch(id).await.unwrap() {
            Lookup::Found(record) => assert_eq!(record.get("title"), Some("Thor: The Dark World")),
            other => panic!("expected a record, got {other:?}"),
        }

        let missing = MovieId::new(5).unwrap();
        assert_eq!(repo.fetch(missing).await.unwrap(), Lookup::NotFound(missing));
        assert_eq!(table.reads(), 2);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let table = Arc::new(InMemoryTable::new());
        table.set_fault_injection(true);
        let repo = MovieRepository::new(table);
        let err = repo.fetch(MovieId::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
