#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Attacher Core
//!
//! Reconciliation core for volume attachment controllers.
//!
//! ## Overview
//!
//! The controller watches two resource kinds through an object cache:
//! attachments (a request to attach a target to a node, owned by a named
//! attacher) and targets (the volumes those attachments point at). Every
//! change notification becomes a key in one of two deduplicating,
//! rate-limited work queues; dispatch workers pop keys, re-read the freshest
//! record and hand it to a pluggable [`controller::Handler`].
//!
//! ## Key Properties
//!
//! - **Per-key serialization**: a key is never processed by two workers at once
//! - **Coalescing**: repeated notifications for a pending key collapse into one
//! - **No self-triggering**: status-only error writes made by the handler are
//!   filtered out of the attachment update stream
//! - **Bounded retry**: failed keys back off exponentially, per key
//! - **Sync gate**: no worker starts before both caches have synced
//!
//! ## Module Organization
//!
//! - [`models`] - attachment and target records, the tagged [`models::Resource`]
//! - [`queue`] - work queues and rate limiters
//! - [`cache`] - the object cache interface and an in-memory implementation
//! - [`controller`] - change filter, event routing, dispatch and lifecycle
//! - [`bootstrap`] - building and running a controller from configuration
//! - [`config`] - layered configuration
//! - [`logging`] - structured logging setup
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use attacher_core::cache::MemoryObjectCache;
//! use attacher_core::config::AttacherConfig;
//! use attacher_core::controller::{AttachController, Handler};
//! use attacher_core::models::{AttachmentRecord, TargetRecord};
//! use attacher_core::queue::QueueHandles;
//!
//! struct LoggingHandler;
//!
//! #[async_trait]
//! impl Handler for LoggingHandler {
//!     fn init(&mut self, _queues: QueueHandles) {}
//!     async fn sync_attachment(&self, record: Arc<AttachmentRecord>) {
//!         println!("attach {}", record.name);
//!     }
//!     async fn sync_target(&self, record: Arc<TargetRecord>) {
//!         println!("target {}", record.name);
//!     }
//! }
//!
//! # async fn example() -> attacher_core::Result<()> {
//! let cache = Arc::new(MemoryObjectCache::new());
//! let controller = AttachController::new(
//!     AttacherConfig::default(),
//!     cache.clone(),
//!     Box::new(LoggingHandler),
//! );
//! controller.run(4, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;

pub use bootstrap::{ControllerBootstrap, ControllerHandle, ControllerStatus};
pub use cache::{LookupError, MemoryObjectCache, ObjectCache, ResourceEventHandler};
pub use config::{AttacherConfig, ConfigManager, ConfigurationError, RetryConfig};
pub use controller::{should_enqueue_attachment_change, AttachController, Handler, SyncOutcome};
pub use error::{AttacherError, Result};
pub use models::{AttachmentRecord, QueueKey, Resource, ResourceKind, TargetRecord, VolumeError};
pub use queue::{ItemExponentialFailureRateLimiter, QueueHandles, RateLimiter, WorkQueue};
