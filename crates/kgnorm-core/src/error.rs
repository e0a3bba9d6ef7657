use thiserror::Error;

use crate::config::ConfigError;
use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
