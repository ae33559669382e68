//! Target records are the resources attachments point at, typically volumes.
//! Their spec and status are opaque to the controller core.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub name: String,
    pub resource_version: String,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
}

impl TargetRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_version: String::new(),
            finalizers: Vec::new(),
            spec: serde_json::Value::Null,
            status: serde_json::Value::Null,
        }
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }
}
