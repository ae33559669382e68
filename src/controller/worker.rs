//! Dispatch loops: pop a key, re-read the record, hand it to the handler.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, trace};

use super::handler::Handler;
use crate::cache::ObjectCache;
use crate::models::ResourceKind;
use crate::queue::{QueueHandles, WorkQueue};

/// What happened to a single popped key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The handler was invoked
    Dispatched,
    /// The record no longer exists; nothing to retry
    Deleted,
    /// The cache read failed; the key was requeued with backoff
    Requeued,
    /// The attachment belongs to a different attacher
    Skipped,
    /// The handler panicked; the key was released without retry
    HandlerPanicked,
}

/// Calls `done` for a popped key on every exit path
struct DoneGuard<'a> {
    queue: &'a WorkQueue,
    key: &'a str,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

/// Shared state of all dispatch loops of one controller
pub(crate) struct Dispatcher {
    attacher_name: String,
    cache: Arc<dyn ObjectCache>,
    handler: Arc<dyn Handler>,
    queues: QueueHandles,
}

impl Dispatcher {
    pub(crate) fn new(
        attacher_name: String,
        cache: Arc<dyn ObjectCache>,
        handler: Arc<dyn Handler>,
        queues: QueueHandles,
    ) -> Self {
        Self {
            attacher_name,
            cache,
            handler,
            queues,
        }
    }

    /// Process keys of `kind` until `stop` flips to true or the queue shuts
    /// down. A stopped worker takes no further keys; only the sync already
    /// in progress runs to completion.
    pub(crate) async fn run_worker(
        self: Arc<Self>,
        kind: ResourceKind,
        worker: usize,
        mut stop: watch::Receiver<bool>,
    ) {
        let queue = Arc::clone(self.queues.for_kind(kind));
        debug!(queue = %queue.name(), worker, "Dispatch worker started");

        loop {
            // a dropped sender counts as stop
            let key = tokio::select! {
                biased;
                _ = stop.wait_for(|stopped| *stopped).map(|_| ()) => break,
                key = queue.get() => key,
            };
            let Some(key) = key else {
                break;
            };
            let _done = DoneGuard {
                queue: &queue,
                key: &key,
            };
            let outcome = self.process_key(kind, &key).await;
            trace!(queue = %queue.name(), key = %key, ?outcome, "Key processed");
        }

        debug!(queue = %queue.name(), worker, "Dispatch worker stopped");
    }

    /// Resolve `key` against the cache and dispatch it. The caller owns `done`.
    pub(crate) async fn process_key(&self, kind: ResourceKind, key: &str) -> SyncOutcome {
        match kind {
            ResourceKind::Attachment => self.sync_attachment(key).await,
            ResourceKind::Target => self.sync_target(key).await,
        }
    }

    async fn sync_attachment(&self, name: &str) -> SyncOutcome {
        debug!(attachment = %name, "Started attachment processing");

        let record = match self.cache.get_attachment(name) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                debug!(attachment = %name, "Attachment deleted, ignoring");
                return SyncOutcome::Deleted;
            }
            Err(err) => {
                error!(attachment = %name, error = %err, "Error getting attachment");
                self.queues.attachments.add_rate_limited(name);
                return SyncOutcome::Requeued;
            }
        };

        if record.attacher() != self.attacher_name {
            trace!(
                attachment = %record.name,
                attacher = %record.attacher(),
                "Skipping attachment for another attacher"
            );
            return SyncOutcome::Skipped;
        }

        let call = AssertUnwindSafe(self.handler.sync_attachment(record)).catch_unwind();
        match call.await {
            Ok(()) => SyncOutcome::Dispatched,
            Err(_) => {
                error!(attachment = %name, "❌ WORKER: Handler panicked while syncing attachment");
                SyncOutcome::HandlerPanicked
            }
        }
    }

    async fn sync_target(&self, name: &str) -> SyncOutcome {
        debug!(target_name = %name, "Started target processing");

        let record = match self.cache.get_target(name) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                debug!(target_name = %name, "Target deleted, ignoring");
                return SyncOutcome::Deleted;
            }
            Err(err) => {
                error!(target_name = %name, error = %err, "Error getting target");
                self.queues.targets.add_rate_limited(name);
                return SyncOutcome::Requeued;
            }
        };

        let call = AssertUnwindSafe(self.handler.sync_target(record)).catch_unwind();
        match call.await {
            Ok(()) => SyncOutcome::Dispatched,
            Err(_) => {
                error!(target_name = %name, "❌ WORKER: Handler panicked while syncing target");
                SyncOutcome::HandlerPanicked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryObjectCache;
    use crate::config::RetryConfig;
    use crate::models::{AttachmentRecord, TargetRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Handler for CallLog {
        fn init(&mut self, _queues: QueueHandles) {}

        async fn sync_attachment(&self, record: Arc<AttachmentRecord>) {
            if record.name == "explode" {
                panic!("handler bug");
            }
            self.calls.lock().push(format!("attachment {}", record.name));
        }

        async fn sync_target(&self, record: Arc<TargetRecord>) {
            self.calls.lock().push(format!("target {}", record.name));
        }
    }

    fn dispatcher() -> (Arc<Dispatcher>, Arc<MemoryObjectCache>, Arc<CallLog>) {
        let cache = Arc::new(MemoryObjectCache::new());
        let handler = Arc::new(CallLog::default());
        let queues = QueueHandles::from_retry_config(&RetryConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(
            "csi-attacher".to_string(),
            cache.clone(),
            handler.clone(),
            queues,
        ));
        (dispatcher, cache, handler)
    }

    #[tokio::test]
    async fn owned_attachment_is_dispatched() {
        let (dispatcher, cache, handler) = dispatcher();
        cache.upsert_attachment(AttachmentRecord::new("va-1", "csi-attacher", "pv-1"));

        let outcome = dispatcher.process_key(ResourceKind::Attachment, "va-1").await;
        assert_eq!(outcome, SyncOutcome::Dispatched);
        assert_eq!(*handler.calls.lock(), vec!["attachment va-1".to_string()]);
    }

    #[tokio::test]
    async fn foreign_attachment_is_skipped() {
        let (dispatcher, cache, handler) = dispatcher();
        cache.upsert_attachment(AttachmentRecord::new("va-1", "other-attacher", "pv-1"));

        let outcome = dispatcher.process_key(ResourceKind::Attachment, "va-1").await;
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(handler.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_record_is_not_retried() {
        let (dispatcher, _cache, handler) = dispatcher();

        assert_eq!(
            dispatcher.process_key(ResourceKind::Attachment, "va-1").await,
            SyncOutcome::Deleted
        );
        assert_eq!(
            dispatcher.process_key(ResourceKind::Target, "pv-1").await,
            SyncOutcome::Deleted
        );
        assert!(handler.calls.lock().is_empty());
        assert_eq!(dispatcher.queues.attachments.num_requeues("va-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_failure_requeues_with_backoff() {
        let (dispatcher, cache, handler) = dispatcher();
        cache.upsert_target(TargetRecord::new("pv-1"));
        cache.set_unavailable(ResourceKind::Target, "pv-1", Some("timeout"));

        let outcome = dispatcher.process_key(ResourceKind::Target, "pv-1").await;
        assert_eq!(outcome, SyncOutcome::Requeued);
        assert_eq!(dispatcher.queues.targets.num_requeues("pv-1"), 1);
        assert!(handler.calls.lock().is_empty());

        let key = dispatcher.queues.targets.get().await;
        assert_eq!(key.as_deref(), Some("pv-1"));
    }

    #[tokio::test]
    async fn panicking_handler_releases_the_key() {
        let (dispatcher, cache, _handler) = dispatcher();
        cache.upsert_attachment(AttachmentRecord::new("explode", "csi-attacher", "pv-1"));
        let queue = Arc::clone(&dispatcher.queues.attachments);

        let (_stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(
            Arc::clone(&dispatcher).run_worker(ResourceKind::Attachment, 0, stop_rx),
        );
        queue.add("explode");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // the key is free again: a new add is queued instead of parked
        queue.add("explode");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(queue.metrics().in_flight, 0);

        queue.shut_down();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn stopped_worker_leaves_queued_keys_alone() {
        let (dispatcher, cache, handler) = dispatcher();
        let queue = Arc::clone(&dispatcher.queues.attachments);
        for name in ["va-1", "va-2", "va-3"] {
            cache.upsert_attachment(AttachmentRecord::new(name, "csi-attacher", "pv-1"));
            queue.add(name);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send_replace(true);
        Arc::clone(&dispatcher)
            .run_worker(ResourceKind::Attachment, 0, stop_rx)
            .await;

        assert!(handler.calls.lock().is_empty());
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn dropped_stop_sender_ends_the_worker() {
        let (dispatcher, _cache, _handler) = dispatcher();
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(
            Arc::clone(&dispatcher).run_worker(ResourceKind::Target, 0, stop_rx),
        );

        drop(stop_tx);
        worker.await.unwrap();
        assert!(!dispatcher.queues.targets.is_shutting_down());
    }
}
