//! The engine instance: a registry of models that opens sessions over state.

use crate::{DbState, ModelSchema, Schema, Session};
use std::borrow::Cow;

/// An ORM instance.
///
/// Holds the registered models and nothing else; all data lives in the
/// [`DbState`] a session is opened over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Orm {
    schema: Schema,
}

impl Orm {
    /// Create an instance over an existing schema.
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Register a model.
    pub fn register(&mut self, model: ModelSchema) -> &mut Self {
        self.schema.register(model);
        self
    }

    /// Builder-style method to register a model.
    pub fn with_model(mut self, model: ModelSchema) -> Self {
        self.register(model);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// State with one empty table per registered model.
    pub fn empty_db_state(&self) -> DbState {
        let mut state = DbState::new();
        for name in self.schema.models.keys() {
            state.tables.insert(name.clone(), Default::default());
        }
        state
    }

    /// Open a session over `state`.
    ///
    /// Passing `&DbState` gives a read session that never copies the state;
    /// the first write clones it.
    pub fn session<'a>(&'a self, state: impl Into<Cow<'a, DbState>>) -> Session<'a> {
        Session::new(self, state.into())
    }

    /// Open a session over [`Orm::empty_db_state`].
    pub fn empty_session(&self) -> Session<'_> {
        self.session(self.empty_db_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, FieldType};

    fn orm() -> Orm {
        Orm::default()
            .with_model(ModelSchema::new(
                "Post",
                vec![FieldDef::required("title", FieldType::String)],
            ))
            .with_model(ModelSchema::new("Comment", vec![]))
    }

    #[test]
    fn empty_db_state_has_a_table_per_model() {
        let state = orm().empty_db_state();
        assert_eq!(state.tables.len(), 2);
        assert!(state.table("Post").unwrap().is_empty());
        assert!(state.table("Comment").unwrap().is_empty());
        assert_eq!(state.row_count(), 0);
    }

    #[test]
    fn register_replaces_model() {
        let mut orm = orm();
        orm.register(ModelSchema::new("Post", vec![]));
        assert!(orm.schema().get_model("Post").unwrap().fields.is_empty());
    }
}
