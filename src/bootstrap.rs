//! # Controller Bootstrap
//!
//! Builds an [`AttachController`] from loaded configuration and runs it on
//! the current tokio runtime, returning a handle for lifecycle management.
//!
//! Process-level concerns stay outside: the caller supplies the object cache
//! (already watching), the handler, and decides how leader election gates the
//! call to [`ControllerBootstrap::start`].

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::ObjectCache;
use crate::config::ConfigManager;
use crate::controller::{AttachController, Handler};
use crate::error::{AttacherError, Result};
use crate::logging::init_structured_logging;
use crate::queue::QueueMetrics;

/// Running controller plus the means to stop it
pub struct ControllerHandle {
    controller: Arc<AttachController>,
    shutdown_sender: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
    config_manager: Arc<ConfigManager>,
}

/// Snapshot of a running controller
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub environment: String,
    pub attacher_name: String,
    pub worker_threads: usize,
    pub leader_election_enabled: bool,
    pub leader_lock_name: String,
    pub attachment_queue: QueueMetrics,
    pub target_queue: QueueMetrics,
}

impl ControllerHandle {
    pub fn controller(&self) -> &Arc<AttachController> {
        &self.controller
    }

    /// True until `stop` is called or the run task has exited on its own
    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal the controller to stop; idempotent
    pub fn stop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            // the run task may already have exited on a sync failure
            let _ = sender.send(());
            info!("🛑 BOOTSTRAP: Attach controller shutdown requested");
        } else {
            warn!("Attach controller already stopped");
        }
    }

    /// Wait for the run task to finish and return its result
    pub async fn wait(&mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| AttacherError::Internal(format!("controller task failed: {e}")))?,
            None => Ok(()),
        }
    }

    /// Stop, then wait for the drain to complete
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop();
        self.wait().await
    }

    pub fn status(&self) -> ControllerStatus {
        let config = self.config_manager.config();
        ControllerStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            attacher_name: config.attacher_name.clone(),
            worker_threads: config.worker_threads,
            leader_election_enabled: config.leader_election.enabled,
            leader_lock_name: config.leader_lock_name(),
            attachment_queue: self.controller.queues().attachments.metrics(),
            target_queue: self.controller.queues().targets.metrics(),
        }
    }
}

pub struct ControllerBootstrap;

impl ControllerBootstrap {
    /// Build a controller from validated configuration without starting it
    pub fn build(
        config_manager: &ConfigManager,
        cache: Arc<dyn ObjectCache>,
        handler: Box<dyn Handler>,
    ) -> Result<AttachController> {
        let config = config_manager.config();
        config.validate()?;

        if config.leader_election.enabled {
            info!(
                lock = %config.leader_lock_name(),
                namespace = ?config.leader_election.namespace,
                "Leader election enabled; controller expects to be started by the lease holder"
            );
        }

        Ok(AttachController::new(config.clone(), cache, handler))
    }

    /// Initialize logging, build the controller and run it with
    /// `worker_threads` workers per queue
    pub fn start(
        config_manager: Arc<ConfigManager>,
        cache: Arc<dyn ObjectCache>,
        handler: Box<dyn Handler>,
    ) -> Result<ControllerHandle> {
        init_structured_logging(&config_manager.config().logging);

        let controller = Arc::new(Self::build(&config_manager, cache, handler)?);
        let workers = config_manager.config().worker_threads;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            AttacherError::Internal(format!("controller must start inside a tokio runtime: {e}"))
        })?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let running = Arc::clone(&controller);
        let task = runtime.spawn(async move {
            running
                .run(workers, async move {
                    // a dropped sender also stops the controller
                    let _ = shutdown_receiver.await;
                })
                .await
        });

        info!(
            attacher = %config_manager.config().attacher_name,
            environment = %config_manager.environment(),
            workers,
            "🚀 BOOTSTRAP: Attach controller started"
        );

        Ok(ControllerHandle {
            controller,
            shutdown_sender: Some(shutdown_sender),
            task: Some(task),
            config_manager,
        })
    }
}
