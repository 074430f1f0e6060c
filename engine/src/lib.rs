//! # ORM Engine
//!
//! A small, deterministic, in-memory relational engine for normalized state
//! trees.
//!
//! Data lives in a plain [`DbState`] value that a host store keeps in one of
//! its slices. An [`Orm`] knows the registered models and opens a [`Session`]
//! over such a state; sessions hand out [`Table`]s, and tables produce
//! [`QuerySet`]s.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network, or globals
//! - **Plain state**: everything an engine reads is in [`DbState`]
//! - **Structured failures**: every failure is an [`Error`] variant callers
//!   can match on
//! - **No planning**: queries are linear passes over a table in insertion order
//!
//! ## Quick Start
//!
//! ```rust
//! use orm_engine::{FieldDef, FieldType, Id, Lookup, ModelSchema, Orm, SortKey};
//! use serde_json::json;
//!
//! // 1. Register models
//! let orm = Orm::default().with_model(ModelSchema::new(
//!     "Post",
//!     vec![FieldDef::required("title", FieldType::String)],
//! ));
//!
//! // 2. Write some rows
//! let mut session = orm.empty_session();
//! session.create("Post", json!({"id": 1, "title": "Hello"})).unwrap();
//! session.create("Post", json!({"id": 2, "title": "World"})).unwrap();
//! let state = session.into_state();
//!
//! // 3. Read them back through a fresh session
//! let session = orm.session(&state);
//! let posts = session.table("Post").unwrap();
//!
//! let titles = posts
//!     .all()
//!     .filter(&Lookup::predicate(|row| row["id"].as_i64() > Some(1)))
//!     .unwrap()
//!     .order_by(&[SortKey::desc("title")])
//!     .to_ref_array();
//! assert_eq!(titles, vec![json!({"id": 2, "title": "World"})]);
//! assert!(posts.has_id(&Id::Int(1)));
//! ```

pub mod error;
pub mod id;
pub mod instance;
pub mod orm;
pub mod query;
pub mod schema;
pub mod session;
pub mod state;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use id::Id;
pub use instance::ModelInstance;
pub use orm::Orm;
pub use query::{compare_values, Direction, Iteratee, Lookup, QuerySet, SortKey};
pub use schema::{FieldDef, FieldType, ModelSchema, Schema, DEFAULT_ID_ATTRIBUTE};
pub use session::{Session, Table};
pub use state::{DbState, TableMeta, TableState};

/// Type alias for clarity
pub type ModelName = String;
