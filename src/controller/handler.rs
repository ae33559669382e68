//! The business-logic seam of the controller.
//!
//! A [`Handler`] performs the actual attach, detach or finalizer work. The
//! controller guarantees that no two `sync_*` calls for the same key of the
//! same kind overlap. It does not retry on the handler's behalf: a handler
//! calls `forget` on success and `add_rate_limited` on failure through the
//! queues it received at [`Handler::init`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{AttachmentRecord, TargetRecord};
use crate::queue::QueueHandles;

#[async_trait]
pub trait Handler: Send + Sync {
    /// Receive the controller's queues. Called once, before any sync.
    fn init(&mut self, queues: QueueHandles);

    /// Reconcile one attachment owned by this controller's attacher
    async fn sync_attachment(&self, record: Arc<AttachmentRecord>);

    /// Reconcile one target, e.g. drop a finalizer once no attachment uses it
    async fn sync_target(&self, record: Arc<TargetRecord>);
}
