//! Error types for the attacher core.

use crate::cache::LookupError;
use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttacherError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cache sync error: {0}")]
    CacheSync(String),
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigurationError> for AttacherError {
    fn from(error: ConfigurationError) -> Self {
        AttacherError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AttacherError>;
