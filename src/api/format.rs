//! Response body for the movie routes.

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::database::{Lookup, MovieId, Record, ValidationError};

pub const GREETING: &str = "Hello Miztiikal World, How is it going?";

/// Attributes every served record must carry.
const REQUIRED_FIELDS: [&str; 1] = ["title"];

/// Everything a movie lookup can end in short of a store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(Record),
    NotFound(MovieId),
    Invalid(ValidationError),
}

impl From<Lookup> for Outcome {
    fn from(lookup: Lookup) -> Self {
        match lookup {
            Lookup::Found(record) => Self::Found(record),
            Lookup::NotFound(id) => Self::NotFound(id),
        }
    }
}

impl From<ValidationError> for Outcome {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err)
    }
}

/// `movie` is the record when there is one and an empty string otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MovieField {
    Record(Record),
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovieResponse {
    pub message: String,
    pub movie: MovieField,
    /// When the record was read from the store, RFC 3339.
    pub ts: String,
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("record {id} is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Renders `outcome` with `fetched_at` as the timestamp.
///
/// ```
/// use movie_cache::api::{format, MovieField, Outcome};
/// use movie_cache::database::MovieId;
/// use time::macros::datetime;
///
/// let body = format(
///     Outcome::NotFound(MovieId::new(4).unwrap()),
///     datetime!(2024-05-01 12:00 UTC),
/// )
/// .unwrap();
/// assert_eq!(body.movie, MovieField::Empty(""));
/// assert_eq!(body.ts, "2024-05-01T12:00:00Z");
/// ```
pub fn format(outcome: Outcome, fetched_at: OffsetDateTime) -> Result<MovieResponse, FormatError> {
    let ts = fetched_at.format(&Rfc3339)?;
    let (message, movie) = match outcome {
        Outcome::Found(record) => {
            if let Some(field) = REQUIRED_FIELDS.into_iter().find(|f| record.get(f).is_none()) {
                return Err(FormatError::MissingField {
                    id: record.id,
                    field,
                });
            }
            (GREETING.to_owned(), MovieField::Record(record))
        }
        Outcome::NotFound(_) => (GREETING.to_owned(), MovieField::Empty("")),
        Outcome::Invalid(err) => (err.to_string(), MovieField::Empty("")),
    };
    Ok(MovieResponse { message, movie, ts })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const AT: OffsetDateTime = datetime!(2024-05-01 12:30:05 UTC);

    #[test]
    fn found_record_is_embedded() {
        let record = Record::new("3").with("title", "Thor: The Dark World");
        let body = format(Outcome::Found(record.clone()), AT).unwrap();
        assert_eq!(body.message, GREETING);
        assert_eq!(body.movie, MovieField::Record(record));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["movie"]["title"], "Thor: The Dark World");
        assert_eq!(json["ts"], "2024-05-01T12:30:05Z");
    }

    #[test]
    fn invalid_id_carries_the_message() {
        let err = MovieId::parse("10").unwrap_err();
        let body = format(err.into(), AT).unwrap();
        assert_eq!(body.message, "Choose Movie id between 0 and 9");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["movie"], "");
    }

    #[test]
    fn record_without_title_is_rejected() {
        let record = Record::new("2").with("year", "2013");
        let err = format(Outcome::Found(record), AT).unwrap_err();
        assert!(matches!(err, FormatError::MissingField { field: "title", .. }));
    }
}
