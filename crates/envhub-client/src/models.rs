//! Wire models of the envhub API, as seen by clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Response envelope wrapping every API payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub id: i64,
    #[serde(default)]
    pub environment_id: i64,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Environment {
    /// Value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|v| (v.key.clone(), v.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for KeyValue {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateEnvironmentRequest<'a> {
    pub name: &'a str,
    pub values: &'a [KeyValue],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateEnvironmentRequest<'a> {
    pub environment_id: i64,
    pub values: &'a [KeyValue],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_server_envelope() {
        let body = r#"{
            "data": {
                "id": 3,
                "name": "ci",
                "values": [{"id": 9, "environment_id": 3, "key": "TOKEN", "value": "abc",
                            "created_at": "2025-06-01T00:00:00Z", "updated_at": "2025-06-01T00:00:00Z"}],
                "created_at": "2025-06-01T00:00:00Z",
                "updated_at": "2025-06-01T00:00:00Z"
            },
            "code": 201,
            "message": "Environment created"
        }"#;
        let envelope: Envelope<Environment> = serde_json::from_str(body).unwrap();
        let env = envelope.data.unwrap();
        assert_eq!(envelope.code, 201);
        assert!(envelope.error.is_none());
        assert_eq!(env.get("TOKEN"), Some("abc"));
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn test_decodes_error_envelope() {
        let body = r#"{"code": 404, "message": "could not find resource", "error": "environment 4 not found"}"#;
        let envelope: Envelope<Environment> = serde_json::from_str(body).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.as_deref(), Some("environment 4 not found"));
    }
}
