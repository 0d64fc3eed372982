//! Page metadata: title, meta tags, OpenGraph, Twitter cards, canonical, language.

use std::collections::BTreeMap;

use super::{element_text, ParsedPage};

/// Build the flattened metadata map for a page.
///
/// OpenGraph and Twitter properties keep their prefix with the colon turned
/// into an underscore, so `og:title` is stored as `og_title`.
pub(super) fn page_metadata(page: &ParsedPage) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();

    if let Some(title) = page.select("title").into_iter().next() {
        let title = element_text(title);
        if !title.is_empty() {
            meta.insert("title".to_string(), title);
        }
    }

    for element in page.select("meta") {
        let attrs = element.value();
        let Some(content) = attrs.attr("content").map(str::trim) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        let key = attrs
            .attr("property")
            .or_else(|| attrs.attr("name"))
            .map(|k| k.trim().to_lowercase());
        let Some(key) = key else {
            continue;
        };

        match key.as_str() {
            "description" | "keywords" => {
                meta.entry(key.clone())
                    .or_insert_with(|| content.to_string());
            }
            k if k.starts_with("og:") || k.starts_with("twitter:") => {
                meta.entry(flatten_key(k))
                    .or_insert_with(|| content.to_string());
            }
            _ => {}
        }
    }

    if let Some(href) = page
        .select("link[rel='canonical']")
        .into_iter()
        .find_map(|link| link.value().attr("href"))
    {
        meta.insert("canonical".to_string(), href.trim().to_string());
    }

    if let Some(lang) = page
        .select("html")
        .into_iter()
        .find_map(|html| html.value().attr("lang"))
    {
        let lang = lang.trim();
        if !lang.is_empty() {
            meta.insert("language".to_string(), lang.to_string());
        }
    }

    meta
}

fn flatten_key(key: &str) -> String {
    key.replace(':', "_")
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_metadata;

    #[test]
    fn test_metadata_extraction() {
        let html = r#"
            <html lang="en-GB">
            <head>
                <title> eToro Review 2024 </title>
                <meta name="description" content="Full eToro broker review">
                <meta name="keywords" content="etoro, broker, review">
                <meta property="og:title" content="eToro Review">
                <meta property="og:image" content="https://cdn.example.com/etoro.png">
                <meta name="twitter:card" content="summary_large_image">
                <meta name="viewport" content="width=device-width">
                <link rel="canonical" href="https://example.com/broker-reviews/etoro/">
            </head>
            <body></body>
            </html>
        "#;

        let meta = extract_metadata(html);
        assert_eq!(meta.get("title").map(String::as_str), Some("eToro Review 2024"));
        assert_eq!(
            meta.get("description").map(String::as_str),
            Some("Full eToro broker review")
        );
        assert_eq!(
            meta.get("keywords").map(String::as_str),
            Some("etoro, broker, review")
        );
        assert_eq!(meta.get("og_title").map(String::as_str), Some("eToro Review"));
        assert!(meta.contains_key("og_image"));
        assert_eq!(
            meta.get("twitter_card").map(String::as_str),
            Some("summary_large_image")
        );
        assert_eq!(
            meta.get("canonical").map(String::as_str),
            Some("https://example.com/broker-reviews/etoro/")
        );
        assert_eq!(meta.get("language").map(String::as_str), Some("en-GB"));
        assert!(!meta.contains_key("viewport"));
    }

    #[test]
    fn test_missing_metadata_is_absent() {
        let meta = extract_metadata("<html><body><p>nothing</p></body></html>");
        assert!(meta.is_empty());
    }
}
