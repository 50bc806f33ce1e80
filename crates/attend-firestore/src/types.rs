//! Firestore REST API wire types.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Firestore document value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Named document carrying `fields`, used inside writes.
    pub fn named(name: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        Self {
            name: Some(name.into()),
            fields: Some(fields),
            ..Default::default()
        }
    }

    /// Typed field accessor.
    pub fn field<T: FromFirestoreValue>(&self, key: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(key))
            .and_then(T::from_firestore_value)
    }
}

/// Document field mask for partial updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

impl DocumentMask {
    /// Mask covering exactly the keys of `fields`, sorted.
    pub fn covering(fields: &HashMap<String, Value>) -> Self {
        let mut field_paths: Vec<String> = fields.keys().cloned().collect();
        field_paths.sort();
        Self { field_paths }
    }
}

/// Value computed by the server when a write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerValue {
    /// Commit time of the request
    RequestTime,
}

/// Server-side transform of one field, applied after the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    pub set_to_server_value: ServerValue,
}

/// A single write in a commit.
///
/// With an `update_mask`, only the masked fields are replaced and the
/// document is created if missing; unmasked fields are preserved.
/// Transformed fields are set by the server and stay out of the mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
}

impl Write {
    /// Field-masked upsert of `fields` into document `name`.
    pub fn merge(name: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        let mask = DocumentMask::covering(&fields);
        Self {
            update: Document::named(name, fields),
            update_mask: Some(mask),
            update_transforms: Vec::new(),
        }
    }

    /// Also set `field` to the server's commit time.
    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.update_transforms.push(FieldTransform {
            field_path: field.into(),
            set_to_server_value: ServerValue::RequestTime,
        });
        self
    }
}

/// Atomic commit request (`documents:commit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

/// Result of a single write in a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub update_time: Option<String>,
}

/// Commit response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub write_results: Option<Vec<WriteResult>>,
    pub commit_time: Option<String>,
}

/// Convert a Rust value to a Firestore value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert a Firestore value to a Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_wire_shape() {
        let json = serde_json::to_value("present".to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({"stringValue": "present"}));

        let json = serde_json::to_value(42i64.to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({"integerValue": "42"}));
    }

    #[test]
    fn test_merge_write_masks_every_field() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), "present".to_firestore_value());
        fields.insert("name".to_string(), "ALICE".to_firestore_value());

        let write = Write::merge("projects/p/databases/(default)/documents/a/b", fields);
        let mask = write.update_mask.unwrap();
        assert_eq!(mask.field_paths, vec!["name", "status"]);

        let json = serde_json::to_value(&write.update).unwrap();
        assert!(json.get("createTime").is_none());
    }

    #[test]
    fn test_document_field_accessor() {
        let mut fields = HashMap::new();
        fields.insert("rollNo".to_string(), "24CS071".to_firestore_value());
        fields.insert("count".to_string(), Value::IntegerValue("3".into()));
        let doc = Document::named("x", fields);

        assert_eq!(doc.field::<String>("rollNo").as_deref(), Some("24CS071"));
        assert_eq!(doc.field::<i64>("count"), Some(3));
        assert_eq!(doc.field::<bool>("rollNo"), None);
        assert_eq!(doc.field::<String>("missing"), None);
    }

    #[test]
    fn test_timestamp_round_trip_precision() {
        let now = Utc::now();
        let parsed = DateTime::<Utc>::from_firestore_value(&now.to_firestore_value()).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
