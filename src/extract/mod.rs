//! HTML content extraction.
//!
//! Everything in this module is synchronous and free of I/O. A page is parsed
//! once into a [`ParsedPage`] and the text, metadata, structured data, and
//! review extractors all run against that DOM.
//!
//! The free functions [`extract_text`], [`extract_metadata`], and
//! [`extract_structured_data`] parse on every call and exist for callers that
//! only need one view of a page.

mod metadata;
mod review;
mod signals;
mod structured;
mod text;

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::models::StructuredPayload;

pub use review::{is_review_url, ReviewParser, MAX_LIST_ITEMS, MAX_SECTION_KEY_LEN};
pub use signals::{extract_contact_info, extract_emails, extract_phones, BROKER_SIGNALS};
pub use text::collapse_whitespace;

/// A parsed HTML document.
pub struct ParsedPage {
    document: Html,
}

impl ParsedPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Collect all elements matching a CSS selector. Invalid selectors match nothing.
    pub(crate) fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.document.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// The `<body>` element, or the document root for fragments.
    pub(crate) fn body(&self) -> ElementRef<'_> {
        self.select("body")
            .into_iter()
            .next()
            .unwrap_or_else(|| self.document.root_element())
    }

    /// Visible body text with scripts and styles removed.
    pub fn text(&self) -> String {
        text::visible_text(self.body())
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        metadata::page_metadata(self)
    }

    pub fn structured_data(&self, url: &str) -> StructuredPayload {
        structured::structured_payload(self, url)
    }
}

/// Extract whitespace-collapsed visible text from an HTML document.
pub fn extract_text(html: &str) -> String {
    ParsedPage::parse(html).text()
}

/// Extract title, description, keywords, social properties, canonical link, and language.
pub fn extract_metadata(html: &str) -> BTreeMap<String, String> {
    ParsedPage::parse(html).metadata()
}

/// Extract JSON-LD blocks, broker signals, contact info, and ratings.
pub fn extract_structured_data(html: &str, url: &str) -> StructuredPayload {
    ParsedPage::parse(html).structured_data(url)
}

/// Text content of an element with whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
