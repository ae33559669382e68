//! # System Constants
//!
//! Queue names, default intervals and environment variable names shared by the
//! configuration layer and the controller.

/// Work queue names, one per watched resource kind
pub mod queues {
    pub const ATTACHMENT_QUEUE: &str = "csi-attacher-va";
    pub const TARGET_QUEUE: &str = "csi-attacher-pv";
}

/// Defaults applied when no configuration overrides them
pub mod defaults {
    pub const ATTACHER_NAME: &str = "csi-attacher";
    pub const WORKER_THREADS: usize = 10;
    pub const RESYNC_PERIOD_SECONDS: u64 = 600;
    pub const RETRY_INTERVAL_START_MS: u64 = 1_000;
    pub const RETRY_INTERVAL_MAX_MS: u64 = 300_000;
    pub const CACHE_SYNC_POLL_INTERVAL_MS: u64 = 100;
    pub const SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
    pub const HANDLER_TIMEOUT_SECONDS: u64 = 15;
    pub const LEADER_LOCK_SUFFIX: &str = "-leader";
}

/// Environment variables consulted during startup
pub mod env {
    pub const ENVIRONMENT: &str = "ATTACHER_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PATH: &str = "ATTACHER_CONFIG_PATH";
    pub const CONFIG_PREFIX: &str = "ATTACHER";
    pub const CONFIG_SEPARATOR: &str = "__";
}

