//! Record - the opaque unit of data handed to a sink
//!
//! A record is any JSON value. Sinks pick the rendering that matches their
//! native format: a text line, a delimited row, query pairs or a request body.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque record delivered by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    /// Wrap a JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse one input line: valid JSON becomes that value, anything else a string record
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str(line) {
            Ok(value) => Self(value),
            Err(_) => Self(Value::String(line.to_string())),
        }
    }

    /// Borrow the underlying value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Render as a single text line
    ///
    /// Strings are written verbatim, every other value as compact JSON.
    pub fn to_line(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Render as bytes for message payloads (same text as [`Record::to_line`])
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_line())
    }

    /// Compact JSON encoding, strings included as JSON strings
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    /// Render as delimited-row fields
    ///
    /// Arrays map element-wise, objects contribute their values in key order,
    /// scalars become a single field. `null` renders as an empty field.
    pub fn to_row(&self) -> Vec<String> {
        match &self.0 {
            Value::Array(items) => items.iter().map(field_text).collect(),
            Value::Object(map) => map.values().map(field_text).collect(),
            other => vec![field_text(other)],
        }
    }

    /// Render as query or form pairs
    ///
    /// Objects map to `key=value` pairs. Strings are parsed as an already
    /// encoded `a=1&b=2` query. Other values yield `None`.
    pub fn to_pairs(&self) -> Option<Vec<(String, String)>> {
        match &self.0 {
            Value::Object(map) => Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), field_text(v)))
                    .collect(),
            ),
            Value::String(s) => Some(parse_query(s)),
            Value::Null => Some(Vec::new()),
            _ => None,
        }
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Record {
    fn from(s: &str) -> Self {
        Self(Value::String(s.to_string()))
    }
}

impl From<String> for Record {
    fn from(s: String) -> Self {
        Self(Value::String(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_rendering() {
        assert_eq!(Record::from("plain text").to_line(), "plain text");
        assert_eq!(Record::new(json!({"a": 1})).to_line(), r#"{"a":1}"#);
        assert_eq!(Record::new(json!(42)).to_line(), "42");
    }

    #[test]
    fn test_from_line_falls_back_to_string() {
        assert_eq!(Record::from_line(r#"{"id":7}"#), Record::new(json!({"id": 7})));
        assert_eq!(Record::from_line("not json"), Record::from("not json"));
    }

    #[test]
    fn test_row_rendering() {
        let row = Record::new(json!(["a", 1, null, true])).to_row();
        assert_eq!(row, vec!["a", "1", "", "true"]);

        let row = Record::new(json!({"x": "1", "y": 2})).to_row();
        assert_eq!(row, vec!["1", "2"]);

        assert_eq!(Record::from("solo").to_row(), vec!["solo"]);
    }

    #[test]
    fn test_pairs_rendering() {
        let pairs = Record::new(json!({"q": "rust", "page": 2})).to_pairs().unwrap();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "rust".to_string())
            ]
        );

        let pairs = Record::from("a=1&b").to_pairs().unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), String::new())
            ]
        );

        assert!(Record::new(json!([1, 2])).to_pairs().is_none());
    }
}
