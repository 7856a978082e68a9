//! Sample catalogue and the one-shot loader that writes it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::{KeyValueStore, Record, StoreError};

// (title, year, rating); the record id is the position.
const MOVIES: [(&str, &str, Option<&str>); 10] = [
    ("Rush", "2013", Some("8.3")),
    ("Prisoners", "2013", Some("8.2")),
    ("The Hunger Games: Catching Fire", "2013", None),
    ("Thor: The Dark World", "2013", None),
    ("This Is the End", "2013", Some("7.2")),
    ("Insidious: Chapter 2", "2013", Some("7.1")),
    ("World War Z", "2013", Some("7.1")),
    ("X-Men: Days of Future Past", "2014", None),
    ("Transformers: Age of Extinction", "2014", None),
    ("Now You See Me", "2013", Some("7.3")),
];

/// The ten sample records, ids `"0"` through `"9"`.
pub fn sample_movies() -> Vec<Record> {
    MOVIES
        .iter()
        .enumerate()
        .map(|(idx, (title, year, rating))| {
            let record = Record::new(idx.to_string())
                .with("title", *title)
                .with("year", *year);
            match rating {
                Some(rating) => record.with("rating", *rating),
                None => record,
            }
        })
        .collect()
}

/// Lifecycle event delivered to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    Create,
    Update,
    Delete,
}

/// What the loader did for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { records: usize },
    NoUpdatesMade,
    DeleteTriggered,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { records } => write!(f, "loaded {records} records"),
            Self::NoUpdatesMade => f.write_str("no_updates_made"),
            Self::DeleteTriggered => f.write_str("delete_triggered"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to write record {id}: {source}")]
    Write {
        id: String,
        #[source]
        source: StoreError,
    },
}

/// Seeds a store with [`sample_movies`].
///
/// Only `Create` touches the store; the data is treated as immutable afterwards,
/// so `Update` and `Delete` are acknowledged without writing.
pub struct DataLoader {
    store: Arc<dyn KeyValueStore>,
}

impl DataLoader {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, event: LoadEvent) -> Result<LoadStatus, LoadError> {
        let status = match event {
            LoadEvent::Create => {
                let records = sample_movies();
                let count = records.len();
                for record in records {
                    let id = record.id.clone();
                    self.store
                        .put(record)
                        .await
                        .map_err(|source| LoadError::Write { id, source })?;
                }
                LoadStatus::Loaded { records: count }
            }
            LoadEvent::Update => LoadStatus::NoUpdatesMade,
            LoadEvent::Delete => LoadStatus::DeleteTriggered,
        };
        info!(?event, %status, "data load event handled");
        Ok(status)
    }
}
