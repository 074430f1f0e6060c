//! Query sets over the rows of one table.
//!
//! A [`QuerySet`] borrows rows from a session and never copies them until an
//! evaluator materializes a result. Clause methods (`filter`, `exclude`,
//! `order_by`) return a new query set; evaluator methods return values.

use crate::{error::Result, Error, Id, ModelInstance, ModelSchema};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Predicate over a plain row.
pub type RowPredicate = Rc<dyn Fn(&Value) -> bool>;

/// Sort key function over a plain row.
pub type RowKey = Rc<dyn Fn(&Value) -> Value>;

/// How rows are matched by `filter`, `exclude` and `get`.
#[derive(Clone)]
pub enum Lookup {
    /// Every attribute of the object must equal the row's attribute.
    Fields(Value),
    /// Arbitrary predicate over the plain row.
    Predicate(RowPredicate),
}

impl Lookup {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        Lookup::Predicate(Rc::new(f))
    }

    /// Match a single attribute.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(name.into(), value.into());
        Lookup::Fields(Value::Object(fields))
    }

    /// Reject lookups that cannot match anything meaningfully.
    pub fn validate(&self, model: &ModelSchema) -> Result<()> {
        match self {
            Lookup::Fields(Value::Object(_)) | Lookup::Predicate(_) => Ok(()),
            Lookup::Fields(other) => Err(Error::InvalidLookup {
                model: model.model_name.clone(),
                reason: format!(
                    "expected an object, got {}",
                    crate::schema::kind_of(other)
                ),
            }),
        }
    }

    /// Whether `row` matches. Call [`Lookup::validate`] first.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Lookup::Fields(Value::Object(fields)) => fields.iter().all(|(name, expected)| {
                row.get(name)
                    .is_some_and(|actual| compare_values(actual, expected) == Ordering::Equal)
            }),
            Lookup::Fields(_) => false,
            Lookup::Predicate(f) => f(row),
        }
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Lookup::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Value> for Lookup {
    fn from(value: Value) -> Self {
        Lookup::Fields(value)
    }
}

impl From<serde_json::Map<String, Value>> for Lookup {
    fn from(fields: serde_json::Map<String, Value>) -> Self {
        Lookup::Fields(Value::Object(fields))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// What a [`SortKey`] orders by.
#[derive(Clone)]
pub enum Iteratee {
    Field(String),
    Key(RowKey),
}

impl fmt::Debug for Iteratee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Iteratee::Field(name) => f.debug_tuple("Field").field(name).finish(),
            Iteratee::Key(_) => f.write_str("Key(..)"),
        }
    }
}

/// One component of an `order_by` clause.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub iteratee: Iteratee,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            iteratee: Iteratee::Field(field.into()),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            iteratee: Iteratee::Field(field.into()),
            direction: Direction::Desc,
        }
    }

    /// Order by a value computed from the row.
    pub fn by<F>(f: F, direction: Direction) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self {
            iteratee: Iteratee::Key(Rc::new(f)),
            direction,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = match &self.iteratee {
            Iteratee::Field(name) => compare_values(
                a.get(name).unwrap_or(&Value::Null),
                b.get(name).unwrap_or(&Value::Null),
            ),
            Iteratee::Key(key) => compare_values(&key(a), &key(b)),
        };
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl From<&str> for SortKey {
    fn from(field: &str) -> Self {
        SortKey::asc(field)
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type rank, then by value.
///
/// Integers compare exactly; mixed integer/float pairs compare as `f64`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((xk, xv), (yk, yv))| xk.cmp(yk).then_with(|| compare_values(xv, yv)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// An ordered selection of rows from one table.
#[derive(Debug, Clone)]
pub struct QuerySet<'s> {
    model: &'s ModelSchema,
    rows: Vec<(&'s Id, &'s Value)>,
}

impl<'s> QuerySet<'s> {
    pub(crate) fn new(model: &'s ModelSchema, rows: Vec<(&'s Id, &'s Value)>) -> Self {
        Self { model, rows }
    }

    pub fn model(&self) -> &ModelSchema {
        self.model
    }

    // Clauses

    /// Keep rows matching `lookup`.
    pub fn filter(self, lookup: &Lookup) -> Result<Self> {
        lookup.validate(self.model)?;
        Ok(self.retain(|row| lookup.matches(row)))
    }

    /// Drop rows matching `lookup`.
    pub fn exclude(self, lookup: &Lookup) -> Result<Self> {
        lookup.validate(self.model)?;
        Ok(self.retain(|row| !lookup.matches(row)))
    }

    /// Stable sort by `keys`, earlier keys taking precedence.
    pub fn order_by(mut self, keys: &[SortKey]) -> Self {
        self.rows.sort_by(|(_, a), (_, b)| {
            keys.iter()
                .map(|key| key.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        self
    }

    fn retain(mut self, keep: impl Fn(&Value) -> bool) -> Self {
        self.rows.retain(|(_, row)| keep(*row));
        self
    }

    // Evaluators

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn exists(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Whether a row with `id` is part of this selection.
    pub fn contains_id(&self, id: &Id) -> bool {
        let key = id.key();
        self.rows.iter().any(|(row_id, _)| row_id.key() == key)
    }

    pub fn at(&self, index: usize) -> Option<ModelInstance> {
        self.rows.get(index).map(|entry| self.instance(entry))
    }

    pub fn first(&self) -> Option<ModelInstance> {
        self.rows.first().map(|entry| self.instance(entry))
    }

    pub fn last(&self) -> Option<ModelInstance> {
        self.rows.last().map(|entry| self.instance(entry))
    }

    pub fn to_model_array(&self) -> Vec<ModelInstance> {
        self.rows.iter().map(|entry| self.instance(entry)).collect()
    }

    pub fn to_ref_array(&self) -> Vec<Value> {
        self.rows.iter().map(|(_, row)| (*row).clone()).collect()
    }

    fn instance(&self, (id, row): &(&'s Id, &'s Value)) -> ModelInstance {
        ModelInstance::new(self.model.model_name.clone(), (*id).clone(), (*row).clone())
    }
}
