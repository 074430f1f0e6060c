//! Row identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a row inside a table.
///
/// Rows are keyed either by an integer or by a string. Both shapes share one
/// key space: `Id::Int(0)` and `Id::Str("0")` address the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Str(String),
}

impl Id {
    /// Read an id out of a JSON value. Only integers and strings qualify.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Id::Int),
            serde_json::Value::String(s) => Some(Id::Str(s.clone())),
            _ => None,
        }
    }

    /// The canonical key rows are indexed under.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Convert back into a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Id::Int(n) => serde_json::Value::from(*n),
            Id::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(n) => write!(f, "{}", n),
            Id::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Int(value)
    }
}

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Id::Int(value.into())
    }
}

impl From<u32> for Id {
    fn from(value: u32) -> Self {
        Id::Int(value.into())
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::Str(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value() {
        assert_eq!(Id::from_value(&json!(7)), Some(Id::Int(7)));
        assert_eq!(Id::from_value(&json!("a")), Some(Id::Str("a".into())));
        assert_eq!(Id::from_value(&json!(1.5)), None);
        assert_eq!(Id::from_value(&json!(null)), None);
        assert_eq!(Id::from_value(&json!([1])), None);
    }

    #[test]
    fn shared_key_space() {
        assert_eq!(Id::Int(0).key(), Id::from("0").key());
    }

    #[test]
    fn untagged_serialization() {
        assert_eq!(serde_json::to_string(&Id::Int(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Id::from("x")).unwrap(), "\"x\"");

        let parsed: Id = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, Id::Int(42));
    }
}
