//! Unified error handling for selectors.

use crate::config::ConfigError;

/// Selector error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The model reference given to a factory was neither a name nor a model.
    #[error("a valid model name (string) or model (object) must be provided to select_data, got {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Any engine failure that is not folded into an absent result.
    #[error(transparent)]
    Engine(#[from] orm_engine::Error),
}

/// Result type alias for selectors.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::InvalidModel("12".into());
        assert_eq!(
            err.to_string(),
            "a valid model name (string) or model (object) must be provided to select_data, got 12"
        );

        let err = Error::from(orm_engine::Error::MultipleRows {
            model: "Post".into(),
            count: 2,
        });
        assert_eq!(
            err.to_string(),
            "Expected to find a single row in Post.get. Query matched 2 rows"
        );

        let err = Error::from(ConfigError::MissingInstance);
        assert!(err.to_string().starts_with("impossible to find the ORM instance"));
    }
}
