//! Attachment records bind a target (volume) to an external attacher on a node.
//!
//! The spec half is written by whoever requests the attachment; the status
//! half is written only by handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Unique name; doubles as the queue key
    pub name: String,
    /// Opaque per-write token, compared for equality only
    pub resource_version: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub spec: AttachmentSpec,
    #[serde(default)]
    pub status: AttachmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSpec {
    /// Identity of the controller responsible for this attachment
    pub attacher: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub source: AttachmentSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSource {
    /// Name of the target record; absent on inline or stale records
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentStatus {
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub attachment_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub attach_error: Option<VolumeError>,
    #[serde(default)]
    pub detach_error: Option<VolumeError>,
}

/// Last error reported by a handler for an attach or detach attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeError {
    pub message: String,
    pub time: DateTime<Utc>,
}

impl VolumeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: Utc::now(),
        }
    }
}

impl AttachmentRecord {
    pub fn new(
        name: impl Into<String>,
        attacher: impl Into<String>,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_version: String::new(),
            annotations: BTreeMap::new(),
            finalizers: Vec::new(),
            deletion_timestamp: None,
            spec: AttachmentSpec {
                attacher: attacher.into(),
                node_name: String::new(),
                source: AttachmentSource {
                    target_name: Some(target_name.into()),
                },
            },
            status: AttachmentStatus::default(),
        }
    }

    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.spec.node_name = node_name.into();
        self
    }

    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = resource_version.into();
        self
    }

    pub fn target_name(&self) -> Option<&str> {
        self.spec.source.target_name.as_deref()
    }

    pub fn attacher(&self) -> &str {
        &self.spec.attacher
    }

    /// True when either the attach or the detach error is set
    pub fn has_status_error(&self) -> bool {
        self.status.attach_error.is_some() || self.status.detach_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_points_at_target() {
        let record = AttachmentRecord::new("va-1", "csi-attacher", "pv-1").with_node("node-a");
        assert_eq!(record.target_name(), Some("pv-1"));
        assert_eq!(record.attacher(), "csi-attacher");
        assert_eq!(record.spec.node_name, "node-a");
        assert!(!record.has_status_error());
    }

    #[test]
    fn status_error_detection() {
        let mut record = AttachmentRecord::new("va-1", "csi-attacher", "pv-1");
        record.status.detach_error = Some(VolumeError::new("timed out"));
        assert!(record.has_status_error());
    }

    #[test]
    fn deserializes_with_missing_status() {
        let record: AttachmentRecord = serde_json::from_value(serde_json::json!({
            "name": "va-1",
            "resource_version": "7",
            "spec": { "attacher": "csi-attacher", "source": { "target_name": "pv-1" } }
        }))
        .unwrap();
        assert_eq!(record.status, AttachmentStatus::default());
        assert_eq!(record.target_name(), Some("pv-1"));
    }
}
