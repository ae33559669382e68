//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Sources are layered in order: defaults, optional TOML file, environment.

use super::error::{ConfigResult, ConfigurationError};
use super::AttacherConfig;
use crate::constants::env as env_vars;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AttacherConfig,
    environment: String,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `ATTACHER_CONFIG_PATH` (if set) and the process environment
    pub fn load_from_env() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(env_vars::CONFIG_PATH).ok().map(PathBuf::from);
        Self::load(path.as_deref(), None)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        Self::load(Some(path), None)
    }

    /// Load configuration with an explicit override map instead of the process
    /// environment. Keys use the same `ATTACHER__SECTION__FIELD` shape.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load(path, Some(overrides))
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: AttacherConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_file: None,
        }))
    }

    fn load(
        path: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        debug!(
            environment = %environment,
            file = ?path.map(|p| p.display().to_string()),
            "Loading attacher configuration"
        );

        let defaults = Config::try_from(&AttacherConfig::default())
            .map_err(|e| ConfigurationError::parse_error("defaults", e))?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigurationError::file_read_error(
                    path.display().to_string(),
                    "not a regular file",
                ));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let environment_source = Environment::with_prefix(env_vars::CONFIG_PREFIX)
            .separator(env_vars::CONFIG_SEPARATOR)
            .try_parsing(true);
        let environment_source = match overrides {
            Some(map) => environment_source.source(Some(map.into_iter().collect())),
            None => environment_source,
        };
        builder = builder.add_source(environment_source);

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        let config: AttacherConfig = builder
            .build()
            .and_then(|built| built.try_deserialize::<AttacherConfig>())
            .map_err(|e| ConfigurationError::parse_error(source_name, e))?;

        config.validate()?;

        info!(
            environment = %environment,
            attacher = %config.attacher_name,
            worker_threads = config.worker_threads,
            leader_election = config.leader_election.enabled,
            "⚙️ CONFIG: Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_file: path.map(Path::to_path_buf),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &AttacherConfig {
        &self.config
    }

    /// Deployment environment detected at load time
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Detect the deployment environment from `ATTACHER_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::FALLBACK_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
    }
}
