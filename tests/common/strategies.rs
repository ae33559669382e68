use attacher_core::models::{AttachmentRecord, VolumeError};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

/// Strategy for record names
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}"
}

/// Strategy for resource versions
pub fn version_strategy() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,6}"
}

/// Strategy for optional attach or detach errors
pub fn volume_error_strategy() -> impl Strategy<Value = Option<VolumeError>> {
    prop::option::of(("[a-z ]{1,30}", 0i64..2_000_000_000).prop_map(|(message, secs)| {
        VolumeError {
            message,
            time: Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now),
        }
    }))
}

/// Strategy for attachment records with arbitrary spec and status
pub fn attachment_strategy() -> impl Strategy<Value = AttachmentRecord> {
    (
        name_strategy(),
        version_strategy(),
        name_strategy(),
        name_strategy(),
        any::<bool>(),
        volume_error_strategy(),
        volume_error_strategy(),
    )
        .prop_map(
            |(name, version, target, node, attached, attach_error, detach_error)| {
                let mut record = AttachmentRecord::new(name, "csi-attacher", target)
                    .with_node(node)
                    .with_resource_version(version);
                record.status.attached = attached;
                record.status.attach_error = attach_error;
                record.status.detach_error = detach_error;
                record
            },
        )
}

/// Strategy for consecutive failure counts
pub fn failure_count_strategy() -> impl Strategy<Value = u32> {
    1u32..80
}
