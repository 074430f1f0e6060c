//! Host state trees.
//!
//! A selector is invoked with the host store's whole state. [`StateTree`]
//! is how it finds the ORM slice inside that state.

use crate::config::ConfigError;
use orm_engine::DbState;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// A state snapshot that may hold ORM state under named keys.
pub trait StateTree {
    /// The ORM state stored under `key`, or `None` if there is none.
    fn db_state(&self, key: &str) -> Result<Option<Cow<'_, DbState>>, ConfigError>;
}

/// Untyped host state. The slice is decoded on every read; `null` counts as
/// absent.
impl StateTree for serde_json::Value {
    fn db_state(&self, key: &str) -> Result<Option<Cow<'_, DbState>>, ConfigError> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(slice) => {
                let state = DbState::deserialize(slice).map_err(|e| invalid_slice(key, e))?;
                state.check().map_err(|e| invalid_slice(key, e))?;
                Ok(Some(Cow::Owned(state)))
            }
        }
    }
}

fn invalid_slice(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidDbState {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl StateTree for HashMap<String, DbState> {
    fn db_state(&self, key: &str) -> Result<Option<Cow<'_, DbState>>, ConfigError> {
        Ok(self.get(key).map(Cow::Borrowed))
    }
}

impl StateTree for BTreeMap<String, DbState> {
    fn db_state(&self, key: &str) -> Result<Option<Cow<'_, DbState>>, ConfigError> {
        Ok(self.get(key).map(Cow::Borrowed))
    }
}

impl<T: StateTree + ?Sized> StateTree for &T {
    fn db_state(&self, key: &str) -> Result<Option<Cow<'_, DbState>>, ConfigError> {
        (**self).db_state(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_state_tree() {
        let state = json!({
            "data": {"Post": {"items": [1], "itemsById": {"1": {"id": 1}}}},
            "ui": {"open": true},
            "empty": null
        });

        let slice = state.db_state("data").unwrap().unwrap();
        assert_eq!(slice.row_count(), 1);
        assert!(state.db_state("missing").unwrap().is_none());
        assert!(state.db_state("empty").unwrap().is_none());
    }

    #[test]
    fn json_state_tree_bad_slice() {
        let state = json!({"data": [1, 2, 3]});
        let result = state.db_state("data");
        assert!(matches!(result, Err(ConfigError::InvalidDbState { key, .. }) if key == "data"));
    }

    #[test]
    fn map_state_tree_borrows() {
        let mut state = HashMap::new();
        state.insert("data".to_string(), DbState::new());

        assert!(matches!(
            state.db_state("data").unwrap(),
            Some(Cow::Borrowed(_))
        ));
        assert!(state.db_state("other").unwrap().is_none());
    }
}
