//! External named-entity recognition and relation extraction.
//!
//! The pipeline only sees the two traits below. Concrete backends are chosen
//! in `[services.ner]` / `[services.re]`.

mod http;
mod keywords;
mod patterns;
mod retry;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::RelationCatalog;
use crate::config::{ConfigError, ConfigResult, ExtractorBackend, RecognizerBackend, ServicesConfig};
use crate::entity::RawEntity;
use crate::relation::RawTriple;

pub use http::{HttpExtractor, HttpRecognizer};
pub use keywords::KeywordExtractor;
pub use patterns::{PatternRecognizer, RecognitionPattern};
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service call timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether another attempt could succeed. A client error other than
    /// 408/429, or a body that does not decode, fails the same way again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => !(400..500).contains(status) || matches!(status, 408 | 429),
            Self::InvalidResponse(_) => false,
            Self::Timeout(_) | Self::Http(_) | Self::Unavailable(_) => true,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait::async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Raw spans over `text`, offsets in bytes of `text`.
    async fn recognize(&self, text: &str) -> ServiceResult<Vec<RawEntity>>;
}

#[async_trait::async_trait]
pub trait RelationExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> ServiceResult<Vec<RawTriple>>;
}

pub fn build_recognizer(config: &ServicesConfig) -> ConfigResult<Arc<dyn EntityRecognizer>> {
    match &config.ner {
        Some(RecognizerBackend::Http { url }) => Ok(Arc::new(HttpRecognizer::new(
            url,
            Duration::from_secs(config.request_timeout_secs),
        )?)),
        Some(RecognizerBackend::Patterns { rules }) => Ok(Arc::new(PatternRecognizer::from_rules(rules)?)),
        None => Err(ConfigError::MissingField("services.ner")),
    }
}

pub fn build_extractor(
    config: &ServicesConfig,
    catalog: &RelationCatalog,
) -> ConfigResult<Arc<dyn RelationExtractor>> {
    match &config.re {
        Some(ExtractorBackend::Http { url }) => Ok(Arc::new(HttpExtractor::new(
            url,
            Duration::from_secs(config.request_timeout_secs),
        )?)),
        Some(ExtractorBackend::Keywords) => Ok(Arc::new(KeywordExtractor::from_catalog(catalog)?)),
        None => Err(ConfigError::MissingField("services.re")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_catalog, AliasCollisionPolicy};

    #[test]
    fn test_missing_backends_are_config_errors() {
        let config = ServicesConfig::default();
        let catalog = RelationCatalog::build(&default_catalog(), AliasCollisionPolicy::Reject).unwrap();

        assert!(matches!(
            build_recognizer(&config),
            Err(ConfigError::MissingField("services.ner"))
        ));
        assert!(matches!(
            build_extractor(&config, &catalog),
            Err(ConfigError::MissingField("services.re"))
        ));
    }

    #[test]
    fn test_builds_offline_backends() {
        let config = ServicesConfig {
            ner: Some(RecognizerBackend::Patterns { rules: Vec::new() }),
            re: Some(ExtractorBackend::Keywords),
            ..Default::default()
        };
        let catalog = RelationCatalog::build(&default_catalog(), AliasCollisionPolicy::Reject).unwrap();

        assert!(build_recognizer(&config).is_ok());
        assert!(build_extractor(&config, &catalog).is_ok());
    }
}
