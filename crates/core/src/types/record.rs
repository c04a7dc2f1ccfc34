//! Loosely typed admin records (orders, customers).
//!
//! The admin dashboard renders whatever the server sends for these entities,
//! so the state layer keeps them as JSON objects and only interprets the id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object identified by `_id` or `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// The record's identifier, `_id` first.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("_id")
            .and_then(Value::as_str)
            .or_else(|| self.0.get("id").and_then(Value::as_str))
    }

    /// Whether this record is identified by `id` under either key.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        ["_id", "id"]
            .iter()
            .any(|key| self.0.get(*key).and_then(Value::as_str) == Some(id))
    }

    /// Shallow-merge another record's fields into this one.
    pub fn merge(&mut self, patch: &Self) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Read a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_id_prefers_underscore_id() {
        let record = Record::try_from(json!({"_id": "o1", "id": "legacy"})).unwrap();
        assert_eq!(record.id(), Some("o1"));
        assert!(record.matches("legacy"));
    }

    #[test]
    fn test_merge_is_shallow_and_idempotent() {
        let mut record = Record::try_from(json!({"_id": "o1", "status": "pending", "total": 10})).unwrap();
        let patch = Record::try_from(json!({"_id": "o1", "status": "shipped"})).unwrap();

        record.merge(&patch);
        let once = record.clone();
        record.merge(&patch);

        assert_eq!(record, once);
        assert_eq!(record.get("status"), Some(&json!("shipped")));
        assert_eq!(record.get("total"), Some(&json!(10)));
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(Record::try_from(json!([1, 2])).is_err());
    }
}
