//! JSON-LD blocks, ratings, and assembly of the structured payload.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::signals::{broker_signals, extract_contact_info};
use super::ParsedPage;
use crate::models::StructuredPayload;

static TEXT_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:\.\d{1,2})?)\s*(?:/|out of)\s*(5|10)\b")
        .expect("text score regex is valid")
});

pub(super) fn structured_payload(page: &ParsedPage, url: &str) -> StructuredPayload {
    let text = page.text();
    let json_ld = json_ld_blocks(page);
    let ratings = ratings(&json_ld, &text);

    StructuredPayload {
        url: url.to_string(),
        extracted_at: Utc::now(),
        broker_signals: broker_signals(&text),
        contact: extract_contact_info(page, &text),
        ratings,
        json_ld,
    }
}

/// Parse every `application/ld+json` script. Blocks that fail to parse are skipped.
fn json_ld_blocks(page: &ParsedPage) -> Vec<Value> {
    let mut blocks = Vec::new();

    for (index, script) in page
        .select(r#"script[type="application/ld+json"]"#)
        .into_iter()
        .enumerate()
    {
        let raw = script.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => blocks.push(value),
            Err(e) => debug!("Skipping malformed JSON-LD block {}: {}", index, e),
        }
    }

    blocks
}

/// Collect numeric ratings from JSON-LD `aggregateRating` and textual scores.
fn ratings(json_ld: &[Value], text: &str) -> BTreeMap<String, f64> {
    let mut ratings = BTreeMap::new();

    if let Some(aggregate) = json_ld.iter().find_map(find_aggregate_rating) {
        if let Some(value) = number_field(aggregate, "ratingValue") {
            ratings.insert("rating_value".to_string(), value);
        }
        if let Some(best) = number_field(aggregate, "bestRating") {
            ratings.insert("best_rating".to_string(), best);
        }
        if let Some(count) =
            number_field(aggregate, "reviewCount").or_else(|| number_field(aggregate, "ratingCount"))
        {
            ratings.insert("review_count".to_string(), count);
        }
    }

    if let Some(caps) = TEXT_SCORE_RE.captures(text) {
        let score = caps.get(1).and_then(|m| finite(m.as_str()));
        let scale = caps.get(2).and_then(|m| finite(m.as_str()));
        if let (Some(score), Some(scale)) = (score, scale) {
            if score <= scale {
                ratings.insert("text_score".to_string(), score);
                ratings.insert("text_scale".to_string(), scale);
            }
        }
    }

    ratings
}

fn finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Depth-first search for the first `aggregateRating` object, including `@graph` members.
fn find_aggregate_rating(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if let Some(rating) = map.get("aggregateRating") {
                if rating.is_object() {
                    return Some(rating);
                }
            }
            map.values().find_map(find_aggregate_rating)
        }
        Value::Array(items) => items.iter().find_map(find_aggregate_rating),
        _ => None,
    }
}

/// Read a field that may be encoded as a JSON number or a numeric string.
///
/// Non-finite values (`"NaN"`, `"inf"`) are dropped; JSON cannot carry them.
fn number_field(value: &Value, key: &str) -> Option<f64> {
    let number = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_structured_data;

    #[test]
    fn test_malformed_json_ld_does_not_block_others() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">{"@type": "Organization", "name": "Broker A"}</script>
            <script type="application/ld+json">{ this is not json </script>
            <script type="application/ld+json">
                {"@type": "Review", "itemReviewed": {"@type": "Organization",
                 "aggregateRating": {"ratingValue": "4.6", "bestRating": 5, "reviewCount": 1200}}}
            </script>
            </head><body><p>Rated 4.5 out of 5 by traders.</p></body></html>
        "#;

        let payload = extract_structured_data(html, "https://example.com/brokers/a");
        assert_eq!(payload.url, "https://example.com/brokers/a");
        assert_eq!(payload.json_ld.len(), 2);
        assert_eq!(payload.json_ld[0]["name"], "Broker A");
        assert_eq!(payload.ratings.get("rating_value"), Some(&4.6));
        assert_eq!(payload.ratings.get("best_rating"), Some(&5.0));
        assert_eq!(payload.ratings.get("review_count"), Some(&1200.0));
        assert_eq!(payload.ratings.get("text_score"), Some(&4.5));
        assert_eq!(payload.ratings.get("text_scale"), Some(&5.0));
    }

    #[test]
    fn test_non_finite_ratings_dropped() {
        let html = r#"
            <script type="application/ld+json">
                {"@type": "Product", "aggregateRating":
                    {"ratingValue": "NaN", "bestRating": "inf", "reviewCount": "-Infinity", "ratingCount": 12}}
            </script>
        "#;

        let payload = extract_structured_data(html, "https://example.com/");
        assert!(!payload.ratings.contains_key("rating_value"));
        assert!(!payload.ratings.contains_key("best_rating"));
        assert_eq!(payload.ratings.get("review_count"), Some(&12.0));
        assert!(payload.ratings.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_payload_includes_signals_and_contact() {
        let html = r#"
            <body>
                <p>Regulated by ASIC. Leverage up to 1:500 on forex.</p>
                <p>Email: desk@broker.com</p>
            </body>
        "#;

        let payload = extract_structured_data(html, "https://example.com/");
        assert!(payload.json_ld.is_empty());
        assert!(payload.broker_signals.contains_key("regulation"));
        assert!(payload.broker_signals.contains_key("leverage"));
        assert!(payload.broker_signals.contains_key("instruments"));
        assert_eq!(payload.contact.emails, vec!["desk@broker.com"]);
        assert!(payload.ratings.is_empty());
    }
}
