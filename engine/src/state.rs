//! The normalized database state held in a host state tree.
//!
//! A [`DbState`] is plain data: it is what a host store keeps under its ORM
//! slice, and what a [`Session`](crate::Session) reads from. Tables use
//! `BTreeMap` so serialization is deterministic.

use crate::{error::Result, Error, Id, ModelName};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Bookkeeping for a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    /// Highest integer id seen so far, used to assign ids to new rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_id: Option<i64>,
}

/// Rows of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    /// Row ids in insertion order
    pub items: Vec<Id>,
    /// Rows keyed by [`Id::key`]
    pub items_by_id: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub meta: TableMeta,
}

impl TableState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.items_by_id.contains_key(&id.key())
    }

    pub fn row(&self, id: &Id) -> Option<&serde_json::Value> {
        self.items_by_id.get(&id.key())
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.entries().map(|(_, row)| row)
    }

    /// Ids paired with their rows, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Id, &serde_json::Value)> {
        self.items
            .iter()
            .filter_map(move |id| self.items_by_id.get(&id.key()).map(|row| (id, row)))
    }

    /// Insert a new row or replace an existing one, keeping its position.
    pub(crate) fn put(&mut self, id: Id, row: serde_json::Value) {
        if let Id::Int(n) = id {
            self.meta.max_id = Some(self.meta.max_id.map_or(n, |max| max.max(n)));
        }
        if self.items_by_id.insert(id.key(), row).is_none() {
            self.items.push(id);
        }
    }

    pub(crate) fn remove(&mut self, id: &Id) -> Option<serde_json::Value> {
        let key = id.key();
        let row = self.items_by_id.remove(&key)?;
        self.items.retain(|item| item.key() != key);
        Some(row)
    }

    /// Next id to hand out for a row that has none, or `None` once the
    /// integer id space is used up.
    pub(crate) fn next_id(&self) -> Option<Id> {
        match self.meta.max_id {
            None => Some(Id::Int(0)),
            Some(max) => max.checked_add(1).map(Id::Int),
        }
    }
}

/// The complete database state: one table per registered model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbState {
    pub tables: BTreeMap<ModelName, TableState>,
}

impl DbState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, model: &str) -> Option<&TableState> {
        self.tables.get(model)
    }

    pub(crate) fn table_mut(&mut self, model: &str) -> &mut TableState {
        self.tables.entry(model.to_string()).or_default()
    }

    /// Count rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(TableState::len).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidState(e.to_string()))
    }

    /// Serialize to a JSON value, e.g. to embed it in a host state tree.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidState(e.to_string()))
    }

    /// Deserialize from JSON and check that the row index is consistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let state: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidState(e.to_string()))?;
        state.check()?;
        Ok(state)
    }

    /// Every listed id must have a row and every row must be listed once.
    pub fn check(&self) -> Result<()> {
        for (model, table) in &self.tables {
            if table.items.len() != table.items_by_id.len() {
                return Err(Error::InvalidState(format!(
                    "table {} lists {} ids for {} rows",
                    model,
                    table.items.len(),
                    table.items_by_id.len()
                )));
            }
            let keys: BTreeSet<String> = table.items.iter().map(Id::key).collect();
            if keys.len() != table.items.len() {
                return Err(Error::InvalidState(format!(
                    "table {} lists the same id more than once",
                    model
                )));
            }
            if let Some(id) = table.items.iter().find(|id| !table.contains(id)) {
                return Err(Error::InvalidState(format!(
                    "table {} lists id {} without a row",
                    model, id
                )));
            }
        }
        Ok(())
    }
}

impl<'a> From<&'a DbState> for Cow<'a, DbState> {
    fn from(state: &'a DbState) -> Self {
        Cow::Borrowed(state)
    }
}

impl From<DbState> for Cow<'_, DbState> {
    fn from(state: DbState) -> Self {
        Cow::Owned(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_keeps_insertion_order() {
        let mut table = TableState::new();
        table.put(Id::Int(2), json!({"id": 2}));
        table.put(Id::Int(0), json!({"id": 0}));
        table.put(Id::Int(2), json!({"id": 2, "title": "again"}));

        let rows: Vec<_> = table.rows().cloned().collect();
        assert_eq!(rows, vec![json!({"id": 2, "title": "again"}), json!({"id": 0})]);
        assert_eq!(table.meta.max_id, Some(2));
        assert_eq!(table.next_id(), Some(Id::Int(3)));
    }

    #[test]
    fn remove_row() {
        let mut table = TableState::new();
        table.put(Id::Int(1), json!({"id": 1}));
        table.put(Id::Int(2), json!({"id": 2}));

        assert!(table.remove(&Id::Int(1)).is_some());
        assert!(table.remove(&Id::Int(1)).is_none());
        assert_eq!(table.items, vec![Id::Int(2)]);
    }

    #[test]
    fn next_id_on_empty_table() {
        assert_eq!(TableState::new().next_id(), Some(Id::Int(0)));
    }

    #[test]
    fn json_roundtrip() {
        let mut state = DbState::new();
        state.table_mut("Post").put(Id::Int(0), json!({"id": 0, "title": "Post 0"}));

        let json = state.to_json().unwrap();
        let restored = DbState::from_json(&json).unwrap();
        assert_eq!(state, restored);
        assert_eq!(restored.row_count(), 1);
    }

    #[test]
    fn serialized_layout() {
        let mut state = DbState::new();
        state.table_mut("Post").put(Id::Int(0), json!({"id": 0}));

        assert_eq!(
            state.to_value().unwrap(),
            json!({
                "Post": {
                    "items": [0],
                    "itemsById": {"0": {"id": 0}},
                    "meta": {"maxId": 0}
                }
            })
        );
    }

    #[test]
    fn next_id_exhausted() {
        let mut table = TableState::new();
        table.put(Id::Int(i64::MAX), json!({"id": i64::MAX}));
        assert_eq!(table.next_id(), None);
    }

    #[test]
    fn reject_duplicate_ids() {
        let json = r#"{"Post": {"items": [1, 1], "itemsById": {"1": {"id": 1}, "2": {"id": 2}}}}"#;
        let result = DbState::from_json(json);
        assert!(matches!(result, Err(Error::InvalidState(_))));

        // 1 and "1" share a row key.
        let json = r#"{"Post": {"items": [1, "1"], "itemsById": {"1": {"id": 1}, "2": {"id": 2}}}}"#;
        assert!(DbState::from_json(json).is_err());
    }

    #[test]
    fn reject_dangling_ids() {
        let json = r#"{"Post": {"items": [1], "itemsById": {"2": {"id": 2}}}}"#;
        let result = DbState::from_json(json);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
}
