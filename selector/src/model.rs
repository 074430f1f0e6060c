//! Model selector factory.
//!
//! A [`ModelSelector`] is bound to one model and produces read-only selectors
//! for it: [`all`](ModelSelector::all), [`get`](ModelSelector::get),
//! [`has_id`](ModelSelector::has_id) and [`with_id`](ModelSelector::with_id).
//! None of them touch the engine until they are invoked with a state tree.

use crate::config::{ConfigError, ConfigSource, MissingSlice};
use crate::error::{Error, Result};
use crate::query::QuerySelector;
use crate::state::StateTree;
use orm_engine::{Id, Lookup, ModelInstance, ModelName, ModelSchema, Table};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Something that names a model: a model name or a model definition.
pub trait ModelRef {
    fn into_model_name(self) -> Result<ModelName>;
}

fn checked_name(name: String) -> Result<ModelName> {
    if name.is_empty() {
        Err(Error::InvalidModel("an empty name".into()))
    } else {
        Ok(name)
    }
}

impl ModelRef for &str {
    fn into_model_name(self) -> Result<ModelName> {
        checked_name(self.to_string())
    }
}

impl ModelRef for String {
    fn into_model_name(self) -> Result<ModelName> {
        checked_name(self)
    }
}

impl ModelRef for &String {
    fn into_model_name(self) -> Result<ModelName> {
        checked_name(self.clone())
    }
}

impl ModelRef for &ModelSchema {
    fn into_model_name(self) -> Result<ModelName> {
        checked_name(self.model_name.clone())
    }
}

/// Dynamic model references: a string, or an object with a string
/// `modelName`. Anything else is rejected.
impl ModelRef for &serde_json::Value {
    fn into_model_name(self) -> Result<ModelName> {
        match self {
            serde_json::Value::String(name) => checked_name(name.clone()),
            serde_json::Value::Object(fields) => match fields.get("modelName") {
                Some(serde_json::Value::String(name)) => checked_name(name.clone()),
                _ => Err(Error::InvalidModel(self.to_string())),
            },
            other => Err(Error::InvalidModel(other.to_string())),
        }
    }
}

impl ModelRef for serde_json::Value {
    fn into_model_name(self) -> Result<ModelName> {
        (&self).into_model_name()
    }
}

/// Locates one model's table inside a state tree.
///
/// Every call re-resolves the configuration and opens a fresh session over
/// whatever the state tree currently holds.
#[derive(Clone)]
pub struct TableResolver {
    model_name: ModelName,
    state_key: Option<String>,
    source: Rc<dyn ConfigSource>,
}

impl TableResolver {
    pub fn new(
        model_name: impl Into<ModelName>,
        state_key: Option<String>,
        source: Rc<dyn ConfigSource>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            state_key,
            source,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Open a session over `state` and hand the model's table to `read`.
    pub fn resolve<R, F>(&self, state: &dyn StateTree, read: F) -> Result<R>
    where
        F: FnOnce(Table<'_>) -> Result<R>,
    {
        let config = self.source.resolve()?;

        let key = match self.state_key.as_deref() {
            Some("") => return Err(ConfigError::MissingStateKey.into()),
            Some(key) => key,
            None => config.state_key.as_str(),
        };
        trace!(model = %self.model_name, key, "resolving table from state");

        let slice = match state.db_state(key)? {
            Some(slice) => slice,
            None if config.missing_slice == MissingSlice::Fail => {
                return Err(ConfigError::MissingDbState {
                    key: key.to_string(),
                }
                .into())
            }
            None => {
                debug!(key, "no ORM state in slice, reading the empty state");
                Cow::Owned(config.orm.empty_db_state())
            }
        };

        let session = config.orm.session(slice);
        let table = session.table(&self.model_name)?;
        read(table)
    }
}

impl fmt::Debug for TableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableResolver")
            .field("model_name", &self.model_name)
            .field("state_key", &self.state_key)
            .finish_non_exhaustive()
    }
}

/// Builds selectors for one model.
#[derive(Clone, Debug)]
pub struct ModelSelector {
    resolver: TableResolver,
}

impl ModelSelector {
    /// Bind a factory to `model`, reading configuration from `source`.
    ///
    /// Fails with [`Error::InvalidModel`] if `model` does not name a model.
    pub fn new(model: impl ModelRef, source: impl ConfigSource + 'static) -> Result<Self> {
        Self::with_source(model, Rc::new(source))
    }

    /// Like [`ModelSelector::new`], sharing an existing source.
    pub fn with_source(model: impl ModelRef, source: Rc<dyn ConfigSource>) -> Result<Self> {
        Ok(Self {
            resolver: TableResolver::new(model.into_model_name()?, None, source),
        })
    }

    /// Read from `key` instead of the configured state key.
    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.resolver.state_key = Some(key.into());
        self
    }

    pub fn model_name(&self) -> &str {
        self.resolver.model_name()
    }

    pub fn state_key(&self) -> Option<&str> {
        self.resolver.state_key.as_deref()
    }

    /// A chainable query over every row of the model.
    pub fn all(&self) -> QuerySelector {
        QuerySelector::new(self.resolver.clone())
    }

    /// The single row matching `lookup`, or `None` if no row matches.
    ///
    /// More than one match is still an error.
    pub fn get(
        &self,
        lookup: impl Into<Lookup>,
    ) -> impl Fn(&dyn StateTree) -> Result<Option<ModelInstance>> {
        let resolver = self.resolver.clone();
        let lookup = lookup.into();

        move |state: &dyn StateTree| {
            resolver.resolve(state, |table| match table.get(&lookup) {
                Ok(instance) => Ok(Some(instance)),
                Err(orm_engine::Error::NotFound { model }) => {
                    debug!(%model, ?lookup, "get matched no rows");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            })
        }
    }

    /// Whether a row with `id` exists.
    pub fn has_id(&self, id: impl Into<Id>) -> impl Fn(&dyn StateTree) -> Result<bool> {
        let resolver = self.resolver.clone();
        let id = id.into();

        move |state: &dyn StateTree| resolver.resolve(state, |table| Ok(table.has_id(&id)))
    }

    /// The row with `id`, or `None` if there is none.
    pub fn with_id(
        &self,
        id: impl Into<Id>,
    ) -> impl Fn(&dyn StateTree) -> Result<Option<ModelInstance>> {
        let resolver = self.resolver.clone();
        let id = id.into();

        move |state: &dyn StateTree| {
            resolver.resolve(state, |table| fold_missing_id(table.with_id(&id), &id))
        }
    }
}

/// `None` for a missing row with exactly `id`; other failures pass through.
fn fold_missing_id(
    found: orm_engine::Result<ModelInstance>,
    id: &Id,
) -> Result<Option<ModelInstance>> {
    match found {
        Ok(instance) => Ok(Some(instance)),
        Err(orm_engine::Error::NoInstanceWithId { model, id: missing }) if &missing == id => {
            debug!(%model, %id, "no instance with id");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
