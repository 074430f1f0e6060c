//! Error types for the ORM engine.
//!
//! Every failure is a distinct variant so callers can match on the kind of
//! failure instead of inspecting message text.

use crate::{Id, ModelName};
use thiserror::Error;

/// All possible errors from the ORM engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Registry errors
    #[error("model not registered: {0}")]
    ModelNotRegistered(ModelName),

    // Lookup errors
    #[error("{model} instance not found when calling get method")]
    NotFound { model: ModelName },

    #[error("Expected to find a single row in {model}.get. Query matched {count} rows")]
    MultipleRows { model: ModelName, count: usize },

    #[error("{model} instance with id {id} not found")]
    NoInstanceWithId { model: ModelName, id: Id },

    #[error("invalid lookup for {model}: {reason}")]
    InvalidLookup { model: ModelName, reason: String },

    // Write errors
    #[error("{model} instance with id {id} already exists")]
    DuplicateId { model: ModelName, id: Id },

    #[error("invalid id for {model}: {reason}")]
    InvalidId { model: ModelName, reason: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // State errors
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotFound {
            model: "Post".into(),
        };
        assert_eq!(
            err.to_string(),
            "Post instance not found when calling get method"
        );

        let err = Error::MultipleRows {
            model: "Post".into(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Expected to find a single row in Post.get. Query matched 2 rows"
        );

        let err = Error::NoInstanceWithId {
            model: "Post".into(),
            id: Id::Int(1234),
        };
        assert_eq!(err.to_string(), "Post instance with id 1234 not found");

        let err = Error::TypeMismatch {
            field: "title".into(),
            expected: "string".into(),
            got: "int".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'title': expected string, got int"
        );
    }
}
