//! Shared fixtures: a recording handler, fast configuration and cache setup.

use async_trait::async_trait;
use attacher_core::cache::MemoryObjectCache;
use attacher_core::config::AttacherConfig;
use attacher_core::controller::Handler;
use attacher_core::models::{AttachmentRecord, ResourceKind, TargetRecord};
use attacher_core::queue::QueueHandles;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ATTACHER: &str = "csi-attacher";

/// Configuration with short intervals so tests settle quickly
pub fn fast_config() -> AttacherConfig {
    let mut config = AttacherConfig::default();
    config.attacher_name = ATTACHER.to_string();
    config.worker_threads = 4;
    config.retry.interval_start_ms = 5;
    config.retry.interval_max_ms = 50;
    config.cache_sync.poll_interval_ms = 5;
    config.shutdown_timeout_seconds = 5;
    config
}

pub fn synced_cache() -> Arc<MemoryObjectCache> {
    let cache = Arc::new(MemoryObjectCache::new());
    cache.mark_synced(ResourceKind::Attachment);
    cache.mark_synced(ResourceKind::Target);
    cache
}

pub fn attachment(name: &str, target: &str) -> AttachmentRecord {
    AttachmentRecord::new(name, ATTACHER, target).with_node("node-a")
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// One handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub kind: ResourceKind,
    pub name: String,
    pub resource_version: String,
}

/// State shared between a [`RecordingHandler`] and the test that owns it
#[derive(Debug, Default)]
pub struct Recorder {
    dispatches: Mutex<Vec<Dispatch>>,
    active: Mutex<HashMap<(ResourceKind, String), usize>>,
    overlap: AtomicBool,
    queues: Mutex<Option<QueueHandles>>,
}

impl Recorder {
    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.lock().clone()
    }

    pub fn count(&self, kind: ResourceKind, name: &str) -> usize {
        self.dispatches
            .lock()
            .iter()
            .filter(|d| d.kind == kind && d.name == name)
            .count()
    }

    pub fn last_version(&self, kind: ResourceKind, name: &str) -> Option<String> {
        self.dispatches
            .lock()
            .iter()
            .rev()
            .find(|d| d.kind == kind && d.name == name)
            .map(|d| d.resource_version.clone())
    }

    /// True if two invocations for the same key ever ran at once
    pub fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    pub fn queues(&self) -> Option<QueueHandles> {
        self.queues.lock().clone()
    }

    fn enter(&self, kind: ResourceKind, name: &str) {
        let mut active = self.active.lock();
        let running = active.entry((kind, name.to_string())).or_insert(0);
        *running += 1;
        if *running > 1 {
            self.overlap.store(true, Ordering::SeqCst);
        }
    }

    fn leave(&self, kind: ResourceKind, name: &str) {
        let mut active = self.active.lock();
        if let Some(running) = active.get_mut(&(kind, name.to_string())) {
            *running -= 1;
        }
    }

    fn record(&self, kind: ResourceKind, name: &str, resource_version: &str) {
        self.dispatches.lock().push(Dispatch {
            kind,
            name: name.to_string(),
            resource_version: resource_version.to_string(),
        });
    }
}

/// Handler that records every call and can simulate slow or failing syncs
#[derive(Debug, Default)]
pub struct RecordingHandler {
    recorder: Arc<Recorder>,
    queues: Option<QueueHandles>,
    delay: Duration,
    /// Failures reported per key before a sync succeeds
    failures_per_key: u32,
}

impl RecordingHandler {
    pub fn new() -> (Self, Arc<Recorder>) {
        let handler = Self::default();
        let recorder = Arc::clone(&handler.recorder);
        (handler, recorder)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failures(mut self, failures_per_key: u32) -> Self {
        self.failures_per_key = failures_per_key;
        self
    }

    async fn sync(&self, kind: ResourceKind, name: &str, resource_version: &str) {
        self.recorder.enter(kind, name);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.recorder.record(kind, name, resource_version);
        self.recorder.leave(kind, name);

        let Some(queues) = &self.queues else {
            return;
        };
        let queue = queues.for_kind(kind);
        if queue.num_requeues(name) < self.failures_per_key {
            queue.add_rate_limited(name);
        } else {
            queue.forget(name);
        }
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    fn init(&mut self, queues: QueueHandles) {
        *self.recorder.queues.lock() = Some(queues.clone());
        self.queues = Some(queues);
    }

    async fn sync_attachment(&self, record: Arc<AttachmentRecord>) {
        self.sync(ResourceKind::Attachment, &record.name, &record.resource_version)
            .await;
    }

    async fn sync_target(&self, record: Arc<TargetRecord>) {
        self.sync(ResourceKind::Target, &record.name, &record.resource_version)
            .await;
    }
}
