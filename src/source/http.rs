//! Metric source polled over HTTP
//!
//! Components running out of process expose their usage set as:
//!
//! - `GET {base_url}/usage` → `{"<name>": <u64>, ...}`
//! - `GET {base_url}/usage/{name}` → `{"value": <u64>}`
//! - `POST {base_url}/usage/reset` → any 2xx status

use super::MetricSource;
use crate::error::SourceError;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ValueResponse {
    value: u64,
}

/// Usage set of a component reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpMetricSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMetricSource {
    /// Create a source for the component at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidUrl` if `base_url` is not an absolute
    /// http(s) URL, or `SourceError::Unavailable` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("HTTP client: {}", e)))?;

        Self::with_client(client, base_url)
    }

    /// Create a source sharing an existing client
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidUrl` if `base_url` cannot carry a path.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// `{base_url}/usage/{segments...}`, each segment percent-encoded
    ///
    /// A metric name is always exactly one path segment: `/`, `?`, `#` and `%`
    /// inside it are escaped instead of addressing another resource.
    fn usage_url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push("usage")
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, SourceError> {
        let response = request.send().await.map_err(|e| SourceError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        let response = self.send(self.client.get(url.clone()), &url).await?;
        response.json::<T>().await.map_err(|e| SourceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn list_names(&self) -> Result<Vec<String>, SourceError> {
        let values: BTreeMap<String, u64> = self.get_json(self.usage_url(&[])?).await?;
        Ok(values.into_keys().collect())
    }

    async fn read_value(&self, name: &str) -> Result<u64, SourceError> {
        let body: ValueResponse = self.get_json(self.usage_url(&[name])?).await?;
        Ok(body.value)
    }

    async fn reset(&self) -> Result<(), SourceError> {
        let url = self.usage_url(&["reset"])?;
        self.send(self.client.post(url.clone()), &url).await?;
        tracing::debug!(url = %url, "Usage set reset");
        Ok(())
    }
}
