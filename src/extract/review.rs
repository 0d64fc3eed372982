//! Broker review page parser.
//!
//! Heuristic annotation only. The review-page gate and every field below are
//! hand-tuned against common review layouts and will miss or misread some pages.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

use super::{collapse_whitespace, element_text, text::visible_text, ParsedPage};
use crate::models::ReviewData;

/// Maximum length of a normalized section key, in characters.
pub const MAX_SECTION_KEY_LEN: usize = 60;

/// Maximum number of pros and of cons kept per page.
pub const MAX_LIST_ITEMS: usize = 50;

/// URL path fragments that mark a review page.
const REVIEW_PATH_MARKERS: &[&str] = &["/broker-reviews/", "/review/", "/brokers/"];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"));

static UPDATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:last\s+)?updated(?:\s+on)?:?\s+(\d{4}-\d{2}-\d{2}|\d{1,2}\s+[a-z]+\s+\d{4}|[a-z]+\s+\d{1,2},?\s+\d{4})",
    )
    .expect("updated regex is valid")
});

/// Whether a URL looks like a broker review page.
///
/// Listing pages under `/brokers/` also match; that misclassification is accepted.
pub fn is_review_url(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    REVIEW_PATH_MARKERS.iter().any(|m| path.contains(m))
}

/// Extracts title, rating, sections, and pros/cons from review pages.
pub struct ReviewParser;

impl ReviewParser {
    pub fn parse(html: &str, url: &str) -> ReviewData {
        Self::parse_page(&ParsedPage::parse(html), url)
    }

    pub fn parse_page(page: &ParsedPage, url: &str) -> ReviewData {
        let (pros, cons) = pros_and_cons(page);
        ReviewData {
            url: url.to_string(),
            title: title(page),
            rating: rating(page),
            last_updated: last_updated(page),
            sections: sections(page),
            pros,
            cons,
        }
    }
}

fn title(page: &ParsedPage) -> Option<String> {
    page.select("h1")
        .into_iter()
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// First number inside any element whose class or id mentions "rating".
fn rating(page: &ParsedPage) -> Option<f64> {
    page.select("[class*='rating'], [id*='rating']")
        .into_iter()
        .find_map(|el| {
            let text = element_text(el);
            NUMBER_RE
                .find(&text)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .filter(|n| n.is_finite())
        })
}

fn last_updated(page: &ParsedPage) -> Option<String> {
    if let Some(dt) = page
        .select("time[datetime]")
        .into_iter()
        .find_map(|t| t.value().attr("datetime"))
    {
        return Some(dt.trim().to_string());
    }

    if let Some(modified) = page
        .select("meta[property='article:modified_time']")
        .into_iter()
        .find_map(|m| m.value().attr("content"))
    {
        return Some(modified.trim().to_string());
    }

    let text = page.text();
    UPDATED_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_section_boundary(node: &Node) -> bool {
    matches!(node, Node::Element(el) if matches!(el.name(), "h1" | "h2" | "h3"))
}

/// Map each h2/h3 heading to the sibling content that follows it.
fn sections(page: &ParsedPage) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();

    for heading in page.select("h2, h3") {
        let key = section_key(&element_text(heading));
        if key.is_empty() {
            continue;
        }

        let mut parts: Vec<String> = Vec::new();
        for sibling in heading.next_siblings() {
            if is_section_boundary(sibling.value()) {
                break;
            }
            match sibling.value() {
                Node::Text(text) => parts.push(text.to_string()),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(sibling) {
                        parts.push(visible_text(el));
                    }
                }
                _ => {}
            }
        }

        let content = collapse_whitespace(&parts.join(" "));
        sections.entry(key).or_insert(content);
    }

    sections
}

/// Lowercase a heading and join its words with underscores, capped in length.
fn section_key(heading: &str) -> String {
    heading
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_SECTION_KEY_LEN)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Pros,
    Cons,
}

/// Decide from class/id/aria-label words whether an element holds pros or cons.
fn list_kind(el: &ElementRef<'_>) -> Option<ListKind> {
    let attrs = el.value();
    let words: HashSet<String> = ["class", "id", "aria-label"]
        .iter()
        .filter_map(|name| attrs.attr(name))
        .flat_map(|value| {
            value
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
        })
        .collect();

    let pro = words.contains("pro") || words.contains("pros");
    let con = words.contains("con") || words.contains("cons");
    match (pro, con) {
        (true, false) => Some(ListKind::Pros),
        (false, true) => Some(ListKind::Cons),
        _ => None,
    }
}

fn pros_and_cons(page: &ParsedPage) -> (Vec<String>, Vec<String>) {
    let mut pros: Vec<String> = Vec::new();
    let mut cons: Vec<String> = Vec::new();

    for container in page.select("[class], [id], [aria-label]") {
        let Some(kind) = list_kind(&container) else {
            continue;
        };
        let target = match kind {
            ListKind::Pros => &mut pros,
            ListKind::Cons => &mut cons,
        };

        for item in container.select(&LIST_ITEM) {
            if target.len() >= MAX_LIST_ITEMS {
                break;
            }
            let text = element_text(item);
            if !text.is_empty() && !target.contains(&text) {
                target.push(text);
            }
        }
    }

    (pros, cons)
}

static LIST_ITEM: LazyLock<scraper::Selector> =
    LazyLock::new(|| scraper::Selector::parse("li").expect("li selector is valid"));
