//! Model-wrapped rows.

use crate::{Id, ModelName};
use serde::{Deserialize, Serialize};

/// A row read out of a table, tagged with the model it belongs to.
///
/// The plain row is the instance's *reference*: the same JSON object that is
/// stored in [`TableState::items_by_id`](crate::TableState).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInstance {
    model_name: ModelName,
    id: Id,
    #[serde(rename = "ref")]
    reference: serde_json::Value,
}

impl ModelInstance {
    pub fn new(model_name: impl Into<ModelName>, id: Id, reference: serde_json::Value) -> Self {
        Self {
            model_name: model_name.into(),
            id,
            reference,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// The plain row.
    pub fn reference(&self) -> &serde_json::Value {
        &self.reference
    }

    /// A single attribute of the row.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.reference.get(name)
    }

    pub fn into_ref(self) -> serde_json::Value {
        self.reference
    }
}

impl std::fmt::Display for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model_name, self.id)
    }
}
