//! Direct GET tiers.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use reqwest::redirect::Policy;
use tracing::debug;

use super::{read_response, FetchError, FetchOptions, FetchStrategy, FetchedPage};
use crate::models::FetchStrategyKind;

const ENHANCED_MAX_REDIRECTS: usize = 5;

/// Direct GET with browser-like headers. Accepts statuses below 400.
pub struct EnhancedDirectStrategy {
    client: reqwest::Client,
}

impl EnhancedDirectStrategy {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(Policy::limited(ENHANCED_MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for EnhancedDirectStrategy {
    fn kind(&self) -> FetchStrategyKind {
        FetchStrategyKind::EnhancedDirect
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        debug!("Enhanced direct fetch: {}", url);
        let mut request = self.client.get(url).timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(e, options.timeout))?;
        read_response(response, 400, options.timeout).await
    }
}

/// Direct GET with only a user agent. Accepts statuses below 500.
pub struct BasicDirectStrategy {
    client: reqwest::Client,
}

impl BasicDirectStrategy {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for BasicDirectStrategy {
    fn kind(&self) -> FetchStrategyKind {
        FetchStrategyKind::BasicDirect
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        debug!("Basic direct fetch: {}", url);
        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| FetchError::transport(e, options.timeout))?;
        read_response(response, 500, options.timeout).await
    }
}
