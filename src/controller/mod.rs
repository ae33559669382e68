//! # Attach Controller
//!
//! Level-triggered reconciliation over two resource kinds:
//!
//! ```text
//! object cache ──notify──▶ ChangeRouter ──add──▶ WorkQueue (attachments | targets)
//!                                                     │ get
//!                                                     ▼
//!                       Handler ◀──sync── Dispatcher ──read──▶ object cache
//! ```
//!
//! Notifications carry only keys into the queues; each dispatch re-reads the
//! freshest record from the cache. The queues serialize work per key, so many
//! workers can run without any further locking.
//!
//! ## Lifecycle
//!
//! [`AttachController::run`] waits for both caches to sync, starts `workers`
//! dispatch loops per queue, and blocks until its stop future completes. It
//! then tells every loop to stop taking keys, shuts both queues down and
//! waits (bounded) for syncs already in progress. Keys still queued at that
//! point are not dispatched.

pub mod events;
pub mod filter;
pub mod handler;
pub mod worker;

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{wait_for_cache_sync, ObjectCache};
use crate::config::AttacherConfig;
use crate::error::{AttacherError, Result};
use crate::models::ResourceKind;
use crate::queue::QueueHandles;

pub use events::ChangeRouter;
pub use filter::should_enqueue_attachment_change;
pub use handler::Handler;
pub use worker::SyncOutcome;

use worker::Dispatcher;

const WATCHED_KINDS: [ResourceKind; 2] = [ResourceKind::Attachment, ResourceKind::Target];

/// Shuts the queues down when `run` returns, on every path
struct QueueShutdown<'a>(&'a QueueHandles);

impl Drop for QueueShutdown<'_> {
    fn drop(&mut self) {
        self.0.shut_down();
    }
}

pub struct AttachController {
    instance_id: Uuid,
    config: AttacherConfig,
    cache: Arc<dyn ObjectCache>,
    queues: QueueHandles,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for AttachController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachController")
            .field("instance_id", &self.instance_id)
            .field("attacher_name", &self.config.attacher_name)
            .field("queues", &self.queues)
            .finish()
    }
}

impl AttachController {
    /// Build a controller with exponential limiters taken from `config.retry`
    pub fn new(
        config: AttacherConfig,
        cache: Arc<dyn ObjectCache>,
        handler: Box<dyn Handler>,
    ) -> Self {
        let queues = QueueHandles::from_retry_config(&config.retry);
        Self::with_queues(config, cache, handler, queues)
    }

    /// Build a controller around caller-supplied queues.
    ///
    /// Hands the queues to `handler` and registers the change router with
    /// `cache`; no notification is routed before this returns.
    pub fn with_queues(
        config: AttacherConfig,
        cache: Arc<dyn ObjectCache>,
        mut handler: Box<dyn Handler>,
        queues: QueueHandles,
    ) -> Self {
        let instance_id = Uuid::new_v4();

        handler.init(queues.clone());
        let handler: Arc<dyn Handler> = Arc::from(handler);

        cache.add_event_handler(Arc::new(ChangeRouter::new(queues.clone())));

        let dispatcher = Arc::new(Dispatcher::new(
            config.attacher_name.clone(),
            Arc::clone(&cache),
            handler,
            queues.clone(),
        ));

        info!(
            instance_id = %instance_id,
            attacher = %config.attacher_name,
            "🏗️ CONTROLLER: Attach controller created"
        );

        Self {
            instance_id,
            config,
            cache,
            queues,
            dispatcher,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &AttacherConfig {
        &self.config
    }

    pub fn queues(&self) -> &QueueHandles {
        &self.queues
    }

    /// Run until `stop` completes.
    ///
    /// Fails with [`AttacherError::Configuration`] when `workers` is zero and
    /// with [`AttacherError::CacheSync`] when `stop` completes before both
    /// caches have synced; no worker is started in either case.
    pub async fn run<F>(&self, workers: usize, stop: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let _shutdown = QueueShutdown(&self.queues);

        if workers == 0 {
            error!(attacher = %self.config.attacher_name, "Worker count must be greater than zero");
            return Err(AttacherError::Configuration(
                "worker count must be greater than zero".to_string(),
            ));
        }

        info!(
            instance_id = %self.instance_id,
            attacher = %self.config.attacher_name,
            workers,
            "🚀 CONTROLLER: Starting attach controller"
        );

        tokio::pin!(stop);

        let synced = wait_for_cache_sync(
            self.cache.as_ref(),
            &WATCHED_KINDS,
            self.config.cache_sync.poll_interval(),
            &mut stop,
        )
        .await;
        if !synced {
            error!(attacher = %self.config.attacher_name, "❌ CONTROLLER: Cannot sync caches");
            return Err(AttacherError::CacheSync(
                "stopped before object caches synced".to_string(),
            ));
        }

        let (stop_workers, worker_stop) = watch::channel(false);
        let mut handles = Vec::with_capacity(workers * WATCHED_KINDS.len());
        for worker in 0..workers {
            for kind in WATCHED_KINDS {
                let span = info_span!(
                    "dispatch_worker",
                    attacher = %self.config.attacher_name,
                    queue = %self.queues.for_kind(kind).name(),
                    worker
                );
                let dispatcher = Arc::clone(&self.dispatcher);
                handles.push(tokio::spawn(
                    dispatcher
                        .run_worker(kind, worker, worker_stop.clone())
                        .instrument(span),
                ));
            }
        }

        info!(
            attacher = %self.config.attacher_name,
            workers = handles.len(),
            "✅ CONTROLLER: Caches synced, dispatch workers started"
        );

        stop.await;

        info!(attacher = %self.config.attacher_name, "🛑 CONTROLLER: Shutting down attach controller");
        // workers stop taking keys before the queues close, so the backlog is not dispatched
        stop_workers.send_replace(true);
        self.queues.shut_down();

        let timeout = self.config.shutdown_timeout();
        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "⚠️ CONTROLLER: Dispatch worker ended abnormally");
                    }
                }
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "⚠️ CONTROLLER: Timed out waiting for in-flight handlers, leaving them running"
                );
            }
        }

        info!(attacher = %self.config.attacher_name, "Attach controller stopped");
        Ok(())
    }
}
