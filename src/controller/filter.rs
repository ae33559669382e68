//! Change filtering for attachment updates.
//!
//! Handlers report attach and detach failures by writing the error fields of
//! an attachment's status. Each such write comes back as an update
//! notification; re-queueing it would call the handler again immediately and
//! defeat its exponential backoff. [`should_enqueue_attachment_change`] drops
//! exactly those updates and nothing else.

use crate::models::AttachmentRecord;

/// Decide whether an attachment update needs another sync.
///
/// - same resource version: periodic resync, always enqueue
/// - no error status on either side: the change is elsewhere, enqueue
/// - otherwise enqueue unless the records differ only in resource version
///   and the attach/detach error fields
pub fn should_enqueue_attachment_change(old: &AttachmentRecord, new: &AttachmentRecord) -> bool {
    if old.resource_version == new.resource_version {
        return true;
    }

    if !old.has_status_error() && !new.has_status_error() {
        return true;
    }

    let mut sanitized = new.clone();
    sanitized.resource_version = old.resource_version.clone();
    sanitized.status.attach_error = old.status.attach_error.clone();
    sanitized.status.detach_error = old.status.detach_error.clone();

    sanitized != *old
}
