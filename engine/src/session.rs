//! Sessions and tables.
//!
//! A [`Session`] pairs an [`Orm`] with a [`DbState`]. Reads borrow the state;
//! writes clone it on first use and can be taken back out with
//! [`Session::into_state`], which is how a host reducer produces its next
//! state.

use crate::{
    error::Result, DbState, Error, Id, Lookup, ModelInstance, ModelSchema, Orm, QuerySet,
    TableState,
};
use serde_json::Value;
use std::borrow::Cow;

/// A working view over one database state.
#[derive(Debug, Clone)]
pub struct Session<'a> {
    orm: &'a Orm,
    state: Cow<'a, DbState>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(orm: &'a Orm, state: Cow<'a, DbState>) -> Self {
        Self { orm, state }
    }

    pub fn orm(&self) -> &Orm {
        self.orm
    }

    /// The current state, including writes made through this session.
    pub fn state(&self) -> &DbState {
        &self.state
    }

    pub fn into_state(self) -> DbState {
        self.state.into_owned()
    }

    /// Read handle for a registered model.
    pub fn table(&self, model_name: &str) -> Result<Table<'_>> {
        let model = self.orm.schema().require_model(model_name)?;
        Ok(Table {
            model,
            state: self.state.table(model_name),
        })
    }

    /// Insert a new row. Fails if the id is already taken.
    pub fn create(&mut self, model_name: &str, payload: Value) -> Result<ModelInstance> {
        let model = self.orm.schema().require_model(model_name)?;
        let table = self.state.to_mut().table_mut(model_name);
        let (id, row) = prepare_row(model, table, payload)?;

        if table.contains(&id) {
            return Err(Error::DuplicateId {
                model: model.model_name.clone(),
                id,
            });
        }

        model.validate_payload(&row)?;
        table.put(id.clone(), row.clone());
        Ok(ModelInstance::new(model.model_name.clone(), id, row))
    }

    /// Insert a row, or merge `payload` into the existing row with the same id.
    pub fn upsert(&mut self, model_name: &str, payload: Value) -> Result<ModelInstance> {
        let model = self.orm.schema().require_model(model_name)?;
        let table = self.state.to_mut().table_mut(model_name);
        let (id, row) = prepare_row(model, table, payload)?;

        let row = match (table.row(&id), row) {
            (Some(Value::Object(existing)), Value::Object(update)) => {
                let mut merged = existing.clone();
                merged.extend(update);
                Value::Object(merged)
            }
            (_, row) => row,
        };

        model.validate_payload(&row)?;
        table.put(id.clone(), row.clone());
        Ok(ModelInstance::new(model.model_name.clone(), id, row))
    }

    /// Remove a row by id.
    pub fn delete(&mut self, model_name: &str, id: &Id) -> Result<ModelInstance> {
        let model = self.orm.schema().require_model(model_name)?;
        let row = self
            .state
            .to_mut()
            .table_mut(model_name)
            .remove(id)
            .ok_or_else(|| Error::NoInstanceWithId {
                model: model.model_name.clone(),
                id: id.clone(),
            })?;
        Ok(ModelInstance::new(model.model_name.clone(), id.clone(), row))
    }
}

/// Resolve the id of an incoming row, assigning the next free one if absent.
fn prepare_row(model: &ModelSchema, table: &TableState, payload: Value) -> Result<(Id, Value)> {
    let Value::Object(mut fields) = payload else {
        return Err(Error::InvalidPayload("payload must be an object".into()));
    };

    let id = match fields.get(&model.id_attribute) {
        None | Some(Value::Null) => table.next_id().ok_or_else(|| Error::InvalidId {
            model: model.model_name.clone(),
            reason: "no integer id left to assign".into(),
        })?,
        Some(value) => Id::from_value(value).ok_or_else(|| Error::InvalidId {
            model: model.model_name.clone(),
            reason: format!(
                "'{}' must be an integer or a string, got {}",
                model.id_attribute,
                crate::schema::kind_of(value)
            ),
        })?,
    };

    fields.insert(model.id_attribute.clone(), id.to_value());
    Ok((id, Value::Object(fields)))
}

/// Read access to one model's rows inside a session.
#[derive(Debug, Clone, Copy)]
pub struct Table<'s> {
    model: &'s ModelSchema,
    state: Option<&'s TableState>,
}

impl<'s> Table<'s> {
    pub fn model(&self) -> &'s ModelSchema {
        self.model
    }

    pub fn model_name(&self) -> &'s str {
        &self.model.model_name
    }

    /// Query set over every row, in insertion order.
    pub fn all(&self) -> QuerySet<'s> {
        let rows = self
            .state
            .map(|table| table.entries().collect())
            .unwrap_or_default();
        QuerySet::new(self.model, rows)
    }

    /// The single row matching `lookup`.
    ///
    /// Fails with [`Error::NotFound`] when nothing matches and with
    /// [`Error::MultipleRows`] when more than one row does.
    pub fn get(&self, lookup: &Lookup) -> Result<ModelInstance> {
        let matches = self.all().filter(lookup)?;
        match matches.count() {
            0 => Err(Error::NotFound {
                model: self.model.model_name.clone(),
            }),
            1 => matches.first().ok_or_else(|| Error::NotFound {
                model: self.model.model_name.clone(),
            }),
            count => Err(Error::MultipleRows {
                model: self.model.model_name.clone(),
                count,
            }),
        }
    }

    pub fn has_id(&self, id: &Id) -> bool {
        self.state.is_some_and(|table| table.contains(id))
    }

    /// The row with `id`, or [`Error::NoInstanceWithId`].
    pub fn with_id(&self, id: &Id) -> Result<ModelInstance> {
        self.state
            .and_then(|table| table.row(id))
            .map(|row| ModelInstance::new(self.model.model_name.clone(), id.clone(), row.clone()))
            .ok_or_else(|| Error::NoInstanceWithId {
                model: self.model.model_name.clone(),
                id: id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, FieldType};
    use serde_json::json;

    fn orm() -> Orm {
        Orm::default().with_model(ModelSchema::new(
            "Post",
            vec![
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("views", FieldType::Int),
            ],
        ))
    }

    #[test]
    fn create_and_read() {
        let orm = orm();
        let mut session = orm.empty_session();

        let created = session
            .create("Post", json!({"id": 1, "title": "Hello"}))
            .unwrap();
        assert_eq!(created.id(), &Id::Int(1));

        let table = session.table("Post").unwrap();
        assert!(table.has_id(&Id::Int(1)));
        assert_eq!(
            table.with_id(&Id::Int(1)).unwrap().reference(),
            &json!({"id": 1, "title": "Hello"})
        );
    }

    #[test]
    fn create_assigns_ids() {
        let orm = orm();
        let mut session = orm.empty_session();

        let first = session.create("Post", json!({"title": "a"})).unwrap();
        let second = session.create("Post", json!({"title": "b"})).unwrap();

        assert_eq!(first.id(), &Id::Int(0));
        assert_eq!(second.id(), &Id::Int(1));
        assert_eq!(second.reference(), &json!({"id": 1, "title": "b"}));
    }

    #[test]
    fn create_duplicate() {
        let orm = orm();
        let mut session = orm.empty_session();
        session.create("Post", json!({"id": 1, "title": "a"})).unwrap();

        let result = session.create("Post", json!({"id": 1, "title": "b"}));
        assert!(matches!(result, Err(Error::DuplicateId { id: Id::Int(1), .. })));
    }

    #[test]
    fn create_validates_payload() {
        let orm = orm();
        let mut session = orm.empty_session();

        let result = session.create("Post", json!({"id": 1}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "title"));

        let result = session.create("Post", json!({"id": 1.5, "title": "a"}));
        assert!(matches!(result, Err(Error::InvalidId { .. })));

        let result = session.create("Post", json!("nope"));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn upsert_merges() {
        let orm = orm();
        let mut session = orm.empty_session();
        session.upsert("Post", json!({"id": 1, "title": "a"})).unwrap();
        session.upsert("Post", json!({"id": 1, "views": 3})).unwrap();

        let table = session.table("Post").unwrap();
        assert_eq!(
            table.with_id(&Id::Int(1)).unwrap().into_ref(),
            json!({"id": 1, "title": "a", "views": 3})
        );
        assert_eq!(table.all().count(), 1);
    }

    #[test]
    fn delete_row() {
        let orm = orm();
        let mut session = orm.empty_session();
        session.create("Post", json!({"id": 1, "title": "a"})).unwrap();

        session.delete("Post", &Id::Int(1)).unwrap();
        assert!(!session.table("Post").unwrap().has_id(&Id::Int(1)));

        let result = session.delete("Post", &Id::Int(1));
        assert!(matches!(result, Err(Error::NoInstanceWithId { .. })));
    }

    #[test]
    fn unknown_model() {
        let orm = orm();
        let session = orm.empty_session();
        let result = session.table("Comment");
        assert!(matches!(result, Err(Error::ModelNotRegistered(m)) if m == "Comment"));
    }

    #[test]
    fn get_by_lookup() {
        let orm = orm();
        let mut session = orm.empty_session();
        session.create("Post", json!({"id": 1, "title": "a"})).unwrap();
        session.create("Post", json!({"id": 2, "title": "a"})).unwrap();
        session.create("Post", json!({"id": 3, "title": "b"})).unwrap();

        let table = session.table("Post").unwrap();
        assert_eq!(
            table.get(&json!({"title": "b"}).into()).unwrap().id(),
            &Id::Int(3)
        );
        assert_eq!(
            table.get(&json!({"title": "c"}).into()),
            Err(Error::NotFound {
                model: "Post".into()
            })
        );
        assert_eq!(
            table.get(&json!({"title": "a"}).into()),
            Err(Error::MultipleRows {
                model: "Post".into(),
                count: 2
            })
        );
    }

    #[test]
    fn read_session_does_not_copy() {
        let orm = orm();
        let mut writer = orm.empty_session();
        writer.create("Post", json!({"id": 1, "title": "a"})).unwrap();
        let state = writer.into_state();

        let reader = orm.session(&state);
        assert!(std::ptr::eq(reader.state(), &state));
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let orm = orm();
        let state = DbState::new();
        let session = orm.session(&state);
        let table = session.table("Post").unwrap();

        assert_eq!(table.all().count(), 0);
        assert!(!table.has_id(&Id::Int(0)));
        assert!(matches!(
            table.with_id(&Id::Int(0)),
            Err(Error::NoInstanceWithId { .. })
        ));
    }
}
