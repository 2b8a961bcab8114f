use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema_key::SchemaKey;

/// Ordered label set used to tell same-named series apart.
pub type Labels = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Time,
    Number,
    String,
    Boolean,
    #[default]
    Other,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Time => "time",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Other => "other",
        }
    }

    pub fn from_slug(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "time" | "timestamp" => FieldType::Time,
            "number" | "float" | "int" => FieldType::Number,
            "string" | "text" => FieldType::String,
            "boolean" | "bool" => FieldType::Boolean,
            _ => FieldType::Other,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame {frame:?}: field {field:?} has {actual} values, expected {expected}")]
    RaggedField {
        frame: Option<String>,
        field: String,
        expected: usize,
        actual: usize,
    },
}

/// A named, typed column.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            labels: None,
            values: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(Labels::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct FrameMeta {
    /// Source-specific metadata; continuation tokens live here.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_query_string: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

/// Column-oriented result set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

impl Frame {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: Some(ref_id.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_custom_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(FrameMeta::default)
            .custom
            .insert(key.into(), value.into());
        self
    }

    /// Number of rows, taken from the first field.
    pub fn row_count(&self) -> usize {
        self.fields.first().map(Field::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Non-empty string stored under `key` in the frame's custom metadata.
    pub fn continuation_token(&self, key: &str) -> Option<&str> {
        self.meta
            .as_ref()?
            .custom
            .get(key)?
            .as_str()
            .filter(|token| !token.is_empty())
    }

    pub fn schema_key(&self) -> SchemaKey {
        SchemaKey::of(self)
    }

    /// Checks that every field holds exactly `row_count()` values.
    pub fn validate(&self) -> Result<(), FrameError> {
        let expected = self.row_count();
        match self.fields.iter().find(|field| field.len() != expected) {
            Some(field) => Err(FrameError::RaggedField {
                frame: self.name.clone().or_else(|| self.ref_id.clone()),
                field: field.name.clone(),
                expected,
                actual: field.len(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_count_follows_first_field() {
        let frame = Frame::new("A")
            .with_field(Field::new("time", FieldType::Time).with_values([1, 2, 3]))
            .with_field(Field::new("value", FieldType::Number).with_values([1.5, 2.5, 3.5]));
        assert_eq!(frame.row_count(), 3);
        assert!(frame.validate().is_ok());
        assert!(Frame::new("B").is_empty());
    }

    #[test]
    fn validate_reports_ragged_field() {
        let frame = Frame::new("A")
            .with_name("cpu")
            .with_field(Field::new("time", FieldType::Time).with_values([1, 2]))
            .with_field(Field::new("value", FieldType::Number).with_values([1.0]));
        let err = frame.validate().expect_err("ragged frame must fail");
        assert_eq!(
            err,
            FrameError::RaggedField {
                frame: Some("cpu".into()),
                field: "value".into(),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn continuation_token_ignores_blank_and_non_string_values() {
        let frame = Frame::new("A").with_custom_meta("nextToken", "abc");
        assert_eq!(frame.continuation_token("nextToken"), Some("abc"));
        assert_eq!(frame.continuation_token("other"), None);

        let blank = Frame::new("A").with_custom_meta("nextToken", "");
        assert_eq!(blank.continuation_token("nextToken"), None);

        let numeric = Frame::new("A").with_custom_meta("nextToken", 7);
        assert_eq!(numeric.continuation_token("nextToken"), None);
    }

    #[test]
    fn deserializes_wire_shape() {
        let frame: Frame = serde_json::from_value(json!({
            "ref_id": "A",
            "fields": [
                {"name": "time", "type": "time", "values": [1000, 2000]},
                {"name": "value", "type": "number", "labels": {"host": "a"}, "values": [1, 2]}
            ],
            "meta": {"custom": {"nextToken": "t1"}}
        }))
        .expect("frame parses");
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.fields[1].field_type, FieldType::Number);
        assert_eq!(
            frame.fields[1].labels.as_ref().and_then(|l| l.get("host")),
            Some(&"a".to_string())
        );
        assert_eq!(frame.continuation_token("nextToken"), Some("t1"));
    }

    #[test]
    fn field_type_from_slug_handles_synonyms() {
        assert_eq!(FieldType::from_slug("Timestamp"), FieldType::Time);
        assert_eq!(FieldType::from_slug(" bool "), FieldType::Boolean);
        assert_eq!(FieldType::from_slug("float"), FieldType::Number);
        assert_eq!(FieldType::from_slug("blob"), FieldType::Other);
        assert_eq!(FieldType::String.as_str(), "string");
    }
}
