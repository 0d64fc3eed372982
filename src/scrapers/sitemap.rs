//! Sitemap and sitemap-index walking.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to load or parse one sitemap document.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Sitemap fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Sitemap returned HTTP {0}")]
    Status(u16),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("Unrecognised sitemap root element <{0}>")]
    UnknownRoot(String),
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of further sitemaps.
    Index(Vec<String>),
    /// `<urlset>`: page locations.
    UrlSet(Vec<String>),
}

/// Parse a sitemap or sitemap index, keeping only `<loc>` values.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    // Root is depth 1, <url>/<sitemap> depth 2, their <loc> depth 3.
    let mut depth = 0usize;
    let mut in_entry = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let qname = e.name();
                // Extension elements such as <image:loc> carry a prefix.
                let unprefixed = qname.prefix().is_none();
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match depth {
                    1 => root = Some(name),
                    2 => in_entry = unprefixed && matches!(name.as_str(), "url" | "sitemap"),
                    3 => in_loc = in_entry && unprefixed && name == "loc",
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                match depth {
                    2 => in_entry = false,
                    3 => in_loc = false,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(e)) if in_loc && depth == 3 => {
                let text = e
                    .unescape()
                    .map_err(|err| SitemapError::Xml(err.to_string()))?;
                let loc = text.trim();
                if !loc.is_empty() {
                    locs.push(loc.to_string());
                }
            }
            Ok(Event::CData(e)) if in_loc && depth == 3 => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                let loc = text.trim();
                if !loc.is_empty() {
                    locs.push(loc.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SitemapError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("sitemapindex") => Ok(SitemapDocument::Index(locs)),
        Some("urlset") => Ok(SitemapDocument::UrlSet(locs)),
        Some(other) => Err(SitemapError::UnknownRoot(other.to_string())),
        None => Err(SitemapError::Xml("document has no root element".to_string())),
    }
}

/// Walks a sitemap tree and gathers every page URL it lists.
pub struct SitemapCollector {
    client: reqwest::Client,
    timeout: Duration,
}

impl SitemapCollector {
    pub fn new(user_agent: &str) -> Result<Self, SitemapError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Collect all page URLs reachable from `sitemap_url`.
    ///
    /// Each sitemap is fetched at most once, so cyclic indexes terminate. A node
    /// that fails to load or parse is logged and skipped.
    pub async fn collect(&self, sitemap_url: &str) -> BTreeSet<String> {
        let mut visited = HashSet::new();
        let mut urls = BTreeSet::new();
        self.walk(sitemap_url.to_string(), &mut visited, &mut urls)
            .await;
        info!(
            "Collected {} URLs from {} ({} sitemaps visited)",
            urls.len(),
            sitemap_url,
            visited.len()
        );
        urls
    }

    fn walk<'a>(
        &'a self,
        sitemap_url: String,
        visited: &'a mut HashSet<String>,
        urls: &'a mut BTreeSet<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !visited.insert(sitemap_url.clone()) {
                debug!("Sitemap already visited: {}", sitemap_url);
                return;
            }

            let document = match self.load(&sitemap_url).await {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping sitemap {}: {}", sitemap_url, e);
                    return;
                }
            };

            match document {
                SitemapDocument::UrlSet(locs) => {
                    debug!("Sitemap {} lists {} URLs", sitemap_url, locs.len());
                    urls.extend(locs);
                }
                SitemapDocument::Index(children) => {
                    debug!("Sitemap index {} has {} children", sitemap_url, children.len());
                    for child in children {
                        self.walk(child, visited, urls).await;
                    }
                }
            }
        })
    }

    async fn load(&self, sitemap_url: &str) -> Result<SitemapDocument, SitemapError> {
        let response = self
            .client
            .get(sitemap_url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SitemapError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_sitemap(&body)
    }
}
