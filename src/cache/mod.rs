//! # Object Cache Interface
//!
//! The controller never talks to the backing store directly. It reads records
//! through an [`ObjectCache`], an eventually consistent local mirror of both
//! resource kinds, and learns about changes through the
//! [`ResourceEventHandler`] it registers with that cache.
//!
//! Implementations must deliver notifications for a given key in order, and a
//! read must never be ahead of the last notification delivered for that key.

pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{AttachmentRecord, Resource, ResourceKind, TargetRecord};

pub use memory::MemoryObjectCache;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("failed to read {kind} {name:?}: {reason}")]
    Unavailable {
        kind: ResourceKind,
        name: String,
        reason: String,
    },
}

impl LookupError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn unavailable(
        kind: ResourceKind,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Unavailable {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Deleted objects are resolved, not failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Receives change notifications from an object cache
///
/// Callbacks run on the cache's delivery path and must not block on I/O.
pub trait ResourceEventHandler: Send + Sync {
    fn on_add(&self, resource: Resource);

    /// `old` and `new` are the same kind. During periodic resync both carry
    /// the same resource version.
    fn on_update(&self, old: Resource, new: Resource);

    fn on_delete(&self, resource: Resource);
}

/// Read access and change notifications for both watched kinds
pub trait ObjectCache: Send + Sync {
    fn get_attachment(&self, name: &str) -> Result<Arc<AttachmentRecord>, LookupError>;

    fn get_target(&self, name: &str) -> Result<Arc<TargetRecord>, LookupError>;

    /// True once the initial listing for `kind` has been loaded
    fn has_synced(&self, kind: ResourceKind) -> bool;

    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>);
}

/// Poll `cache` until every kind in `kinds` reports synced.
///
/// Returns `false` if `stop` completes first.
pub async fn wait_for_cache_sync<S>(
    cache: &dyn ObjectCache,
    kinds: &[ResourceKind],
    poll_interval: Duration,
    stop: &mut S,
) -> bool
where
    S: Future<Output = ()> + Unpin,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if kinds.iter().all(|kind| cache.has_synced(*kind)) {
            return true;
        }
        debug!(kinds = ?kinds, "Waiting for object caches to sync");

        tokio::select! {
            _ = &mut *stop => return false,
            _ = ticker.tick() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        assert!(LookupError::not_found(ResourceKind::Attachment, "va-1").is_not_found());
        assert!(
            !LookupError::unavailable(ResourceKind::Attachment, "va-1", "timeout").is_not_found()
        );
    }

    #[test]
    fn error_messages_name_the_record() {
        let err = LookupError::unavailable(ResourceKind::Target, "pv-1", "connection reset");
        assert_eq!(
            err.to_string(),
            "failed to read target \"pv-1\": connection reset"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sync_wait_returns_once_all_kinds_synced() {
        let cache = Arc::new(MemoryObjectCache::new());
        let marker = Arc::clone(&cache);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            marker.mark_synced(ResourceKind::Attachment);
            tokio::time::sleep(Duration::from_millis(250)).await;
            marker.mark_synced(ResourceKind::Target);
        });

        let mut stop = Box::pin(std::future::pending::<()>());
        let synced = wait_for_cache_sync(
            cache.as_ref(),
            &[ResourceKind::Attachment, ResourceKind::Target],
            Duration::from_millis(100),
            &mut stop,
        )
        .await;
        assert!(synced);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_wait_gives_up_on_stop() {
        let cache = MemoryObjectCache::new();
        cache.mark_synced(ResourceKind::Attachment);

        let mut stop = Box::pin(tokio::time::sleep(Duration::from_secs(1)));
        let synced = wait_for_cache_sync(
            &cache,
            &[ResourceKind::Attachment, ResourceKind::Target],
            Duration::from_millis(100),
            &mut stop,
        )
        .await;
        assert!(!synced);
    }
}
