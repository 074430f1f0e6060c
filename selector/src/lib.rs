//! # ORM Selector
//!
//! Lazily evaluated, chainable selectors over ORM state kept inside a host
//! store's state tree.
//!
//! A [`ModelSelector`] is bound to one model. It hands out selectors that do
//! nothing until they are invoked with the host's whole state: only then is
//! the configuration resolved, the ORM slice located, and a fresh session
//! opened over it. Selectors never write.
//!
//! ## Quick Start
//!
//! ```rust
//! use orm_engine::{FieldDef, FieldType, ModelSchema, Orm};
//! use orm_selector::{select_data, set_global_config, OrmConfig};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let orm = Rc::new(Orm::default().with_model(ModelSchema::new(
//!     "Post",
//!     vec![FieldDef::required("title", FieldType::String)],
//! )));
//! set_global_config(OrmConfig::new(orm.clone()));
//!
//! // The host store keeps the ORM state under "data".
//! let mut session = orm.empty_session();
//! for i in 0..10 {
//!     session.create("Post", json!({"id": i, "title": format!("Post {}", i)})).unwrap();
//! }
//! let state = json!({ "data": session.into_state().to_value().unwrap() });
//!
//! let posts = select_data("Post").unwrap();
//! let recent = posts
//!     .all()
//!     .filter(orm_engine::Lookup::predicate(|row| row["id"].as_i64() >= Some(5)))
//!     .count();
//!
//! assert_eq!(recent.select(&state).unwrap().as_count(), Some(5));
//! assert!(posts.has_id(0)(&state).unwrap());
//! assert_eq!(posts.get(json!({"id": 1234}))(&state).unwrap(), None);
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod state;

pub use config::{
    clear_global_config, set_global_config, update_global_config, ConfigError, ConfigSource,
    GlobalConfig, MissingSlice, OrmConfig, ResolvedConfig, DEFAULT_STATE_KEY,
};
pub use error::{Error, Result};
pub use model::{ModelRef, ModelSelector, TableResolver};
pub use query::{
    Clause, Evaluation, Evaluator, Operation, OperationKind, QueryPlan, QuerySelector, Selector,
};
pub use state::StateTree;

/// Selector factory for `model` using this thread's global configuration.
///
/// The configuration is read when a selector runs, not here, so the factory
/// may be built before [`set_global_config`] is called.
pub fn select_data(model: impl ModelRef) -> Result<ModelSelector> {
    ModelSelector::new(model, GlobalConfig)
}

/// Like [`select_data`], reading the ORM state from `state_key`.
pub fn select_data_with_key(
    model: impl ModelRef,
    state_key: impl Into<String>,
) -> Result<ModelSelector> {
    Ok(select_data(model)?.with_state_key(state_key))
}
