//! Model definitions and payload validation.
//!
//! A [`Schema`] is the set of models an [`Orm`](crate::Orm) knows about. Each
//! [`ModelSchema`] names its table, the attribute holding the row id, and the
//! typed fields rows are validated against before they are written.

use crate::{error::Result, Error, ModelName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default attribute holding a row's id.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// The kind of value a model attribute holds.
///
/// Rows are plain JSON, so each type is a set of accepted JSON shapes.
/// `Null` is never accepted here; absence is handled by [`FieldDef::required`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// A number that fits in an `i64`
    Int,
    Float,
    Bool,
    /// A reference to another row: anything usable as an [`Id`](crate::Id)
    Ref,
    /// A list, e.g. the ids of a many-to-many relation
    List,
    /// Any JSON value
    Json,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Ref => "ref",
            FieldType::List => "list",
            FieldType::Json => "json",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Ref => crate::Id::from_value(value).is_some(),
            FieldType::List => value.is_array(),
            FieldType::Json => true,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed attribute of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Check this attribute of `row`. A `null` attribute counts as absent.
    fn check(&self, row: &Map<String, Value>) -> Result<()> {
        match row.get(&self.name).filter(|value| !value.is_null()) {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            Some(value) if !self.field_type.accepts(value) => Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: kind_of(value).to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Short name of a JSON value's shape, for error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Definition of a single model (one table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    /// Model name, also the table name inside a session
    pub model_name: ModelName,
    /// Attribute of each row that holds its id
    pub id_attribute: String,
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    /// Create a model keyed by the default `id` attribute.
    pub fn new(model_name: impl Into<ModelName>, fields: Vec<FieldDef>) -> Self {
        Self {
            model_name: model_name.into(),
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            fields,
        }
    }

    /// Builder-style override of the id attribute.
    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Validate a row payload against the field definitions.
    pub fn validate_payload(&self, payload: &Value) -> Result<()> {
        let row = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        self.fields.iter().try_for_each(|field| field.check(row))
    }
}

/// The set of registered models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Models by name, ordered for deterministic output
    pub models: BTreeMap<ModelName, ModelSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any previous one with the same name.
    pub fn register(&mut self, model: ModelSchema) -> &mut Self {
        self.models.insert(model.model_name.clone(), model);
        self
    }

    /// Builder-style method to register a model.
    pub fn with_model(mut self, model: ModelSchema) -> Self {
        self.register(model);
        self
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }

    /// Get a model by name or fail with [`Error::ModelNotRegistered`].
    pub fn require_model(&self, name: &str) -> Result<&ModelSchema> {
        self.get_model(name)
            .ok_or_else(|| Error::ModelNotRegistered(name.to_string()))
    }
}
