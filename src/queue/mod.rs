//! # Work Queues
//!
//! Rate-limited, deduplicating key queues. The controller owns one queue per
//! resource kind and hands both to its handler through [`QueueHandles`].

pub mod rate_limiter;
pub mod work_queue;

use std::sync::Arc;

use crate::config::RetryConfig;
use crate::constants::queues;
use crate::models::ResourceKind;

pub use rate_limiter::{ItemExponentialFailureRateLimiter, RateLimiter};
pub use work_queue::{QueueMetrics, WorkQueue};

/// The attachment and target queues of one controller instance
#[derive(Debug, Clone)]
pub struct QueueHandles {
    pub attachments: Arc<WorkQueue>,
    pub targets: Arc<WorkQueue>,
}

impl QueueHandles {
    /// Build both queues with independent exponential limiters from `retry`
    pub fn from_retry_config(retry: &RetryConfig) -> Self {
        Self::with_limiters(
            Arc::new(ItemExponentialFailureRateLimiter::from_config(retry)),
            Arc::new(ItemExponentialFailureRateLimiter::from_config(retry)),
        )
    }

    pub fn with_limiters(
        attachment_limiter: Arc<dyn RateLimiter>,
        target_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            attachments: WorkQueue::new(queues::ATTACHMENT_QUEUE, attachment_limiter),
            targets: WorkQueue::new(queues::TARGET_QUEUE, target_limiter),
        }
    }

    pub fn for_kind(&self, kind: ResourceKind) -> &Arc<WorkQueue> {
        match kind {
            ResourceKind::Attachment => &self.attachments,
            ResourceKind::Target => &self.targets,
        }
    }

    pub fn shut_down(&self) {
        self.attachments.shut_down();
        self.targets.shut_down();
    }
}
