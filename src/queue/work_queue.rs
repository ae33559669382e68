//! # Deduplicating Work Queue
//!
//! A FIFO of keys with three guarantees:
//!
//! - a key is pending at most once (`dirty` set), so repeated adds coalesce
//! - a key handed out by [`WorkQueue::get`] is not handed out again until
//!   [`WorkQueue::done`] is called for it (`processing` set); adds made while
//!   it is in flight are parked and queued exactly once at `done`
//! - delayed adds for the same key collapse onto the earliest deadline
//!
//! Retry delays come from the queue's [`RateLimiter`].

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::rate_limiter::RateLimiter;
use crate::models::QueueKey;

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<QueueKey>,
    dirty: HashSet<QueueKey>,
    processing: HashSet<QueueKey>,
    /// Earliest pending deadline of each delayed add
    waiting: HashMap<QueueKey, Instant>,
    shutting_down: bool,
}

impl QueueState {
    /// Returns true when the key became runnable and a getter should be woken
    fn insert(&mut self, key: QueueKey) -> bool {
        if self.shutting_down || self.dirty.contains(&key) {
            return false;
        }
        self.dirty.insert(key.clone());
        if self.processing.contains(&key) {
            return false;
        }
        self.queue.push_back(key);
        true
    }
}

/// Point-in-time counters for a queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub name: String,
    pub depth: usize,
    pub in_flight: usize,
    pub waiting: usize,
    pub adds: u64,
    pub retries: u64,
}

#[derive(Debug)]
pub struct WorkQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
    rate_limiter: Arc<dyn RateLimiter>,
    adds: AtomicU64,
    retries: AtomicU64,
}

impl WorkQueue {
    pub fn new(name: impl Into<String>, rate_limiter: Arc<dyn RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            rate_limiter,
            adds: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `key` unless it is already pending. Ignored after shutdown.
    pub fn add(&self, key: impl Into<QueueKey>) {
        let key = key.into();
        let queued = {
            let mut state = self.state.lock();
            state.insert(key.clone())
        };
        self.adds.fetch_add(1, Ordering::Relaxed);
        if queued {
            trace!(queue = %self.name, key = %key, "Key queued");
            self.notify.notify_one();
        }
    }

    /// Queue `key` once `delay` has elapsed. A later call with an earlier
    /// deadline wins; a later deadline for an already waiting key is dropped.
    pub fn add_after(self: &Arc<Self>, key: impl Into<QueueKey>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let ready_at = Instant::now() + delay;
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            match state.waiting.get(&key) {
                Some(existing) if *existing <= ready_at => return,
                _ => {
                    state.waiting.insert(key.clone(), ready_at);
                }
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    queue = %self.name,
                    key = %key,
                    "No async runtime available for delayed add, queueing immediately"
                );
                self.state.lock().waiting.remove(&key);
                self.add(key);
                return;
            }
        };

        let queue = Arc::clone(self);
        runtime.spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            let queued = {
                let mut state = queue.state.lock();
                if state.waiting.get(&key) != Some(&ready_at) {
                    // superseded by an earlier deadline that already fired or will fire
                    return;
                }
                state.waiting.remove(&key);
                state.insert(key.clone())
            };
            queue.adds.fetch_add(1, Ordering::Relaxed);
            if queued {
                trace!(queue = %queue.name, key = %key, "Delayed key queued");
                queue.notify.notify_one();
            }
        });
    }

    /// Queue `key` after the backoff its failure history calls for
    pub fn add_rate_limited(self: &Arc<Self>, key: impl Into<QueueKey>) {
        let key = key.into();
        let delay = self.rate_limiter.when(&key);
        self.retries.fetch_add(1, Ordering::Relaxed);
        debug!(
            queue = %self.name,
            key = %key,
            delay_ms = delay.as_millis() as u64,
            requeues = self.rate_limiter.num_requeues(&key),
            "Requeueing key with backoff"
        );
        self.add_after(key, delay);
    }

    /// Block until a key is available. Returns `None` once the queue is shut
    /// down and every queued key has been handed out.
    pub async fn get(&self) -> Option<QueueKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark processing of `key` finished; a key re-added meanwhile is queued now
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            trace!(queue = %self.name, key = %key, "Deferred key queued after done");
            self.notify.notify_one();
        }
    }

    /// Reset the failure history of `key`
    pub fn forget(&self, key: &str) {
        self.rate_limiter.forget(key);
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Stop accepting keys and wake every blocked getter
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
            state.waiting.clear();
        }
        debug!(queue = %self.name, "Work queue shutting down");
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Keys waiting to be handed out
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> QueueMetrics {
        let state = self.state.lock();
        QueueMetrics {
            name: self.name.clone(),
            depth: state.queue.len(),
            in_flight: state.processing.len(),
            waiting: state.waiting.len(),
            adds: self.adds.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
