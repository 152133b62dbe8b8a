//! Transport for raw metric responses.

use crate::config::EndpointConfig;
use crate::error::{FetchError, Result};
use crate::fetch::Credential;
use crate::metrics::MetricKey;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Something that can return the raw response body for a metric.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch_body(
        &self,
        key: MetricKey,
        credential: &Credential,
    ) -> std::result::Result<String, FetchError>;
}

/// Fetches metrics from the meeting backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetricSource {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointConfig,
}

impl HttpMetricSource {
    pub fn new(
        base_url: &str,
        endpoints: EndpointConfig,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
        })
    }

    /// Full URL for a metric's endpoint.
    pub fn endpoint_url(&self, key: MetricKey) -> String {
        format!(
            "{}/{}",
            self.base_url,
            self.endpoints.path(key).trim_start_matches('/')
        )
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn fetch_body(
        &self,
        key: MetricKey,
        credential: &Credential,
    ) -> std::result::Result<String, FetchError> {
        let url = self.endpoint_url(key);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("{} returned {}", url, status)));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

/// Parse a response body holding a single number.
///
/// Accepts a JSON number or a JSON string containing a number. Anything else,
/// including NaN and infinities, is a malformed response.
pub fn parse_metric_value(body: &str) -> std::result::Result<f64, FetchError> {
    let malformed = || FetchError::MalformedResponse(excerpt(body));

    let value: serde_json::Value = serde_json::from_str(body.trim()).map_err(|_| malformed())?;
    let number = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(malformed()),
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 64;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}
