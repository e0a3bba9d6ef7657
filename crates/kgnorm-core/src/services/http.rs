use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{EntityRecognizer, RelationExtractor, ServiceError, ServiceResult};
use crate::config::{ConfigError, ConfigResult};
use crate::entity::RawEntity;
use crate::relation::RawTriple;

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

/// JSON-over-HTTP endpoint: `POST {url}` with `{"text": ...}`, answered by a
/// JSON array.
#[derive(Debug, Clone)]
struct JsonEndpoint {
    client: Client,
    url: Url,
}

impl JsonEndpoint {
    fn new(field: &'static str, url: &str, timeout: Duration) -> ConfigResult<Self> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            field,
            reason: format!("`{url}` is not a valid URL: {e}"),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field,
                reason: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self { client, url })
    }

    async fn post<T: DeserializeOwned>(&self, text: &str) -> ServiceResult<Vec<T>> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&TextRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

pub struct HttpRecognizer {
    endpoint: JsonEndpoint,
}

impl HttpRecognizer {
    pub fn new(url: &str, timeout: Duration) -> ConfigResult<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("services.ner.url", url, timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl EntityRecognizer for HttpRecognizer {
    async fn recognize(&self, text: &str) -> ServiceResult<Vec<RawEntity>> {
        tracing::debug!(url = %self.endpoint.url, bytes = text.len(), "Calling NER service");
        self.endpoint.post(text).await
    }
}

pub struct HttpExtractor {
    endpoint: JsonEndpoint,
}

impl HttpExtractor {
    pub fn new(url: &str, timeout: Duration) -> ConfigResult<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("services.re.url", url, timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl RelationExtractor for HttpExtractor {
    async fn extract(&self, text: &str) -> ServiceResult<Vec<RawTriple>> {
        tracing::debug!(url = %self.endpoint.url, bytes = text.len(), "Calling RE service");
        self.endpoint.post(text).await
    }
}
