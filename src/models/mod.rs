//! # Resource Models
//!
//! The two watched resource kinds and the tagged [`Resource`] type that object
//! caches deliver to the controller.

pub mod attachment;
pub mod target;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use attachment::{
    AttachmentRecord, AttachmentSource, AttachmentSpec, AttachmentStatus, VolumeError,
};
pub use target::TargetRecord;

/// Work queue key: the name of an attachment or target record
pub type QueueKey = String;

/// The watched resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Attachment,
    Target,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Attachment => "attachment",
            ResourceKind::Target => "target",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as delivered by an object cache notification
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Attachment(Arc<AttachmentRecord>),
    Target(Arc<TargetRecord>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Attachment(_) => ResourceKind::Attachment,
            Resource::Target(_) => ResourceKind::Target,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Attachment(record) => &record.name,
            Resource::Target(record) => &record.name,
        }
    }

    pub fn resource_version(&self) -> &str {
        match self {
            Resource::Attachment(record) => &record.resource_version,
            Resource::Target(record) => &record.resource_version,
        }
    }
}

impl From<AttachmentRecord> for Resource {
    fn from(record: AttachmentRecord) -> Self {
        Resource::Attachment(Arc::new(record))
    }
}

impl From<TargetRecord> for Resource {
    fn from(record: TargetRecord) -> Self {
        Resource::Target(Arc::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_exposes_kind_and_name() {
        let attachment: Resource = AttachmentRecord::new("va-1", "csi-attacher", "pv-1").into();
        assert_eq!(attachment.kind(), ResourceKind::Attachment);
        assert_eq!(attachment.name(), "va-1");

        let target: Resource = TargetRecord::new("pv-1").into();
        assert_eq!(target.kind(), ResourceKind::Target);
        assert_eq!(target.name(), "pv-1");
    }

    #[test]
    fn kind_displays_lowercase() {
        assert_eq!(ResourceKind::Attachment.to_string(), "attachment");
        assert_eq!(ResourceKind::Target.to_string(), "target");
    }
}
