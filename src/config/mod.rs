//! # Attacher Configuration System
//!
//! Layered configuration for the attach controller: built-in defaults, an
//! optional TOML file, then `ATTACHER__*` environment overrides. Every loaded
//! configuration is validated before a controller can be built from it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use attacher_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_env()?;
//! let workers = manager.config().worker_threads;
//! let retry = manager.config().retry.interval_start();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::defaults;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttacherConfig {
    /// Identity compared against each attachment's attacher field
    pub attacher_name: String,

    /// Dispatch loops started per queue
    pub worker_threads: usize,

    /// Interval at which object caches redeliver unchanged objects
    pub resync_period_seconds: u64,

    /// Per-key exponential backoff for failed keys
    pub retry: RetryConfig,

    /// Startup cache synchronization
    pub cache_sync: CacheSyncConfig,

    /// How long `run` waits for in-flight workers once stopped
    pub shutdown_timeout_seconds: u64,

    /// Budget handed to handlers for a single attach or detach call
    pub handler_timeout_seconds: u64,

    pub leader_election: LeaderElectionConfig,

    pub logging: LoggingConfig,
}

impl Default for AttacherConfig {
    fn default() -> Self {
        Self {
            attacher_name: defaults::ATTACHER_NAME.to_string(),
            worker_threads: defaults::WORKER_THREADS,
            resync_period_seconds: defaults::RESYNC_PERIOD_SECONDS,
            retry: RetryConfig::default(),
            cache_sync: CacheSyncConfig::default(),
            shutdown_timeout_seconds: defaults::SHUTDOWN_TIMEOUT_SECONDS,
            handler_timeout_seconds: defaults::HANDLER_TIMEOUT_SECONDS,
            leader_election: LeaderElectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AttacherConfig {
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }

    /// Name of the lock a process-level leader election would contend for
    pub fn leader_lock_name(&self) -> String {
        self.leader_election
            .lock_name
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.attacher_name, defaults::LEADER_LOCK_SUFFIX))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.attacher_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "attacher_name",
                "attacher configuration",
            ));
        }

        if self.worker_threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_threads",
                "0",
                "worker threads must be greater than zero",
            ));
        }

        if self.retry.interval_start_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.interval_start_ms",
                "0",
                "initial retry interval must be greater than zero",
            ));
        }

        if self.retry.interval_max_ms < self.retry.interval_start_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.interval_max_ms",
                self.retry.interval_max_ms.to_string(),
                format!(
                    "maximum retry interval must be at least the initial interval ({}ms)",
                    self.retry.interval_start_ms
                ),
            ));
        }

        if self.cache_sync.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache_sync.poll_interval_ms",
                "0",
                "poll interval must be greater than zero",
            ));
        }

        if self.leader_election.enabled
            && self
                .leader_election
                .lock_name
                .as_deref()
                .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigurationError::validation_error(
                "leader_election.lock_name must not be blank when leader election is enabled",
            ));
        }

        Ok(())
    }
}

/// Exponential backoff bounds for failed keys
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failure; doubles with each further failure
    pub interval_start_ms: u64,
    /// Ceiling for the per-key delay
    pub interval_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_start_ms: defaults::RETRY_INTERVAL_START_MS,
            interval_max_ms: defaults::RETRY_INTERVAL_MAX_MS,
        }
    }
}

impl RetryConfig {
    pub fn interval_start(&self) -> Duration {
        Duration::from_millis(self.interval_start_ms)
    }

    pub fn interval_max(&self) -> Duration {
        Duration::from_millis(self.interval_max_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSyncConfig {
    pub poll_interval_ms: u64,
}

impl Default for CacheSyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::CACHE_SYNC_POLL_INTERVAL_MS,
        }
    }
}

impl CacheSyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Leader election settings. The election transport itself lives outside
/// this crate; the controller only runs once leadership is held.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub namespace: Option<String>,
    pub lock_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Explicit filter directive such as `info` or `attacher_core=debug`
    pub level: Option<String>,
}
