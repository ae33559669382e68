//! Turns object cache notifications into queue keys.

use tracing::{debug, warn};

use super::filter::should_enqueue_attachment_change;
use crate::cache::ResourceEventHandler;
use crate::models::Resource;
use crate::queue::QueueHandles;

/// Registered with the object cache once, at controller construction
#[derive(Debug, Clone)]
pub struct ChangeRouter {
    queues: QueueHandles,
}

impl ChangeRouter {
    pub fn new(queues: QueueHandles) -> Self {
        Self { queues }
    }
}

impl ResourceEventHandler for ChangeRouter {
    fn on_add(&self, resource: Resource) {
        match resource {
            Resource::Attachment(record) => self.queues.attachments.add(record.name.as_str()),
            Resource::Target(record) => self.queues.targets.add(record.name.as_str()),
        }
    }

    fn on_update(&self, old: Resource, new: Resource) {
        match (old, new) {
            (Resource::Attachment(old), Resource::Attachment(new)) => {
                if should_enqueue_attachment_change(&old, &new) {
                    self.queues.attachments.add(new.name.as_str());
                } else {
                    debug!(attachment = %new.name, "Ignoring attachment change");
                }
            }
            (Resource::Target(_), Resource::Target(new)) => {
                self.queues.targets.add(new.name.as_str());
            }
            (old, new) => {
                warn!(
                    old_kind = %old.kind(),
                    new_kind = %new.kind(),
                    name = %new.name(),
                    "Dropping update whose old and new records differ in kind"
                );
            }
        }
    }

    fn on_delete(&self, resource: Resource) {
        match resource {
            // The attachment is gone; finalizer cleanup is driven from the target
            Resource::Attachment(record) => match record.target_name() {
                Some(target) => self.queues.targets.add(target),
                None => warn!(
                    attachment = %record.name,
                    "Deleted attachment carries no target reference, cleanup not enqueued"
                ),
            },
            Resource::Target(record) => {
                debug!(target_name = %record.name, "Target deleted, nothing to do");
            }
        }
    }
}
