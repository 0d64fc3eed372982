//! Remote fetch-proxy tier.

use async_trait::async_trait;
use prefer::FromValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FetchError, FetchOptions, FetchStrategy, FetchedPage};
use crate::models::FetchStrategyKind;

/// Connection details for the fetch-proxy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromValue)]
pub struct ProxyConfig {
    /// Endpoint that accepts `{url, format, zone}` POST requests.
    pub endpoint: String,
    /// Bearer token.
    pub api_key: String,
    /// Optional proxy zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    url: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a str>,
}

/// Fetches pages through the remote proxy, retrying with backoff.
pub struct ProxyStrategy {
    client: reqwest::Client,
    config: ProxyConfig,
}

impl ProxyStrategy {
    /// Validate the configuration and build the client.
    pub fn new(config: ProxyConfig) -> Result<Self, FetchError> {
        if config.api_key.trim().is_empty() {
            return Err(FetchError::InvalidConfig(
                "proxy api key is empty".to_string(),
            ));
        }
        let endpoint = url::Url::parse(&config.endpoint).map_err(|e| {
            FetchError::InvalidConfig(format!("proxy endpoint {:?}: {}", config.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FetchError::InvalidConfig(format!(
                "proxy endpoint must be http(s), got {}",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder().gzip(true).brotli(true).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl FetchStrategy for ProxyStrategy {
    fn kind(&self) -> FetchStrategyKind {
        FetchStrategyKind::PrimaryProxy
    }

    fn max_attempts(&self, options: &FetchOptions) -> u32 {
        options.max_retries.max(1)
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let request = ProxyRequest {
            url,
            format: "raw",
            zone: self.config.zone.as_deref(),
        };

        debug!("Proxy fetch: {}", url);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::transport(e, options.timeout))?;

        // Any non-2xx from the proxy is a failure, so reject from 300 up.
        super::read_response(response, 300, options.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, key: &str) -> ProxyConfig {
        ProxyConfig {
            endpoint: endpoint.to_string(),
            api_key: key.to_string(),
            zone: None,
        }
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(
            ProxyStrategy::new(config("not a url", "key")),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ProxyStrategy::new(config("https://proxy.example.com/request", "  ")),
            Err(FetchError::InvalidConfig(_))
        ));
        assert!(matches!(
            ProxyStrategy::new(config("ftp://proxy.example.com/", "key")),
            Err(FetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ProxyRequest {
            url: "https://example.com/",
            format: "raw",
            zone: Some("web_unlocker"),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"url": "https://example.com/", "format": "raw", "zone": "web_unlocker"})
        );

        let body = serde_json::to_value(ProxyRequest {
            url: "https://example.com/",
            format: "raw",
            zone: None,
        })
        .unwrap();
        assert!(body.get("zone").is_none());
    }
}
