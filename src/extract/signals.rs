//! Regex heuristics: broker keyword signals and contact details.
//!
//! These are deliberately shallow pattern matchers. They sit behind the
//! `extract_*` functions so a stronger parser can replace any of them without
//! touching callers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::ParsedPage;
use crate::models::ContactInfo;

/// Signal categories and the keywords that trigger them.
pub const BROKER_SIGNALS: &[(&str, &[&str])] = &[
    (
        "regulation",
        &["regulated", "regulation", "fca", "cysec", "asic", "finra", "licensed", "license"],
    ),
    ("spreads", &["spread", "spreads", "pips", "commission", "commissions"]),
    (
        "platforms",
        &["metatrader", "mt4", "mt5", "ctrader", "tradingview", "webtrader"],
    ),
    (
        "instruments",
        &["forex", "cfd", "cfds", "stocks", "crypto", "commodities", "indices", "etf", "etfs"],
    ),
    ("leverage", &["leverage", "margin"]),
    ("deposit", &["deposit", "withdrawal", "withdrawals", "funding"]),
];

/// Characters of context kept on each side of a keyword hit.
const CONTEXT_RADIUS: usize = 50;

const MAX_SNIPPETS_PER_CATEGORY: usize = 20;

static SIGNAL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BROKER_SIGNALS
        .iter()
        .map(|(category, keywords)| {
            let alternation = keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"\b(?:{})\b", alternation);
            (
                *category,
                Regex::new(&pattern).expect("broker signal regex is valid"),
            )
        })
        .collect()
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s().-]{5,22}\d").expect("phone regex is valid"));

/// `2024-01-15`, `12.03.2024`, `03/12/2024` and similar.
static DATE_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,4}\s?[./-]\s?\d{1,2}\s?[./-]\s?\d{1,4}$").expect("date regex is valid")
});

/// Dotted thousands such as `1.000.000`.
static GROUPED_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").expect("grouped number regex is valid"));

/// Social platforms recognised in outbound links, with their domains.
const SOCIAL_PLATFORMS: &[(&str, &[&str])] = &[
    ("facebook", &["facebook.com", "fb.com"]),
    ("twitter", &["twitter.com", "x.com"]),
    ("linkedin", &["linkedin.com"]),
    ("instagram", &["instagram.com"]),
];

const IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// Scan lowercased text for broker keywords and keep a window of context per hit.
pub(super) fn broker_signals(text: &str) -> BTreeMap<String, Vec<String>> {
    let lower = text.to_lowercase();
    let mut signals = BTreeMap::new();

    for (category, pattern) in SIGNAL_PATTERNS.iter() {
        let mut snippets: Vec<String> = Vec::new();
        for hit in pattern.find_iter(&lower) {
            if snippets.len() >= MAX_SNIPPETS_PER_CATEGORY {
                break;
            }
            let snippet = context_window(&lower, hit.start(), hit.end());
            if !snippets.contains(&snippet) {
                snippets.push(snippet);
            }
        }
        if !snippets.is_empty() {
            signals.insert(category.to_string(), snippets);
        }
    }

    signals
}

/// Slice roughly `CONTEXT_RADIUS` bytes around a match, on char boundaries.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].trim().to_string()
}

/// Find email addresses, lowercased and de-duplicated in order of appearance.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut emails: Vec<String> = Vec::new();
    for m in EMAIL_RE.find_iter(text) {
        let email = m.as_str().trim_end_matches('.').to_lowercase();
        if IMAGE_SUFFIXES.iter().any(|s| email.ends_with(s)) {
            continue;
        }
        if !emails.contains(&email) {
            emails.push(email);
        }
    }
    emails
}

/// Find phone numbers of 7 to 15 digits.
///
/// A match needs a leading `+` or separators between its digit groups. Dates
/// and dotted thousands are skipped.
///
/// Results are normalized to the digits, keeping a leading `+` when present.
pub fn extract_phones(text: &str) -> Vec<String> {
    let mut phones: Vec<String> = Vec::new();
    for m in PHONE_RE.find_iter(text) {
        let raw = m.as_str().trim();
        if DATE_LIKE_RE.is_match(raw) || GROUPED_NUMBER_RE.is_match(raw) {
            continue;
        }
        // Without a country code, require a separator or bracket shape; bare
        // digit runs are usually ids or amounts.
        if !raw.starts_with('+') && raw.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if !(7..=15).contains(&digits.len()) {
            continue;
        }
        let phone = if raw.starts_with('+') {
            format!("+{}", digits)
        } else {
            digits
        };
        if !phones.contains(&phone) {
            phones.push(phone);
        }
    }
    phones
}

/// Gather emails, phones, and social profile links from a page.
pub fn extract_contact_info(page: &ParsedPage, text: &str) -> ContactInfo {
    let mut emails = extract_emails(text);
    let mut phones = extract_phones(text);
    let mut social_links: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for link in page.select("a[href]") {
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };

        if let Some(address) = href.strip_prefix("mailto:") {
            for email in extract_emails(address) {
                if !emails.contains(&email) {
                    emails.push(email);
                }
            }
            continue;
        }
        if let Some(number) = href.strip_prefix("tel:") {
            for phone in extract_phones(number) {
                if !phones.contains(&phone) {
                    phones.push(phone);
                }
            }
            continue;
        }

        if let Some(platform) = social_platform(href) {
            let links = social_links.entry(platform.to_string()).or_default();
            if !links.iter().any(|l| l == href) {
                links.push(href.to_string());
            }
        }
    }

    ContactInfo {
        emails,
        phones,
        social_links,
    }
}

fn social_platform(href: &str) -> Option<&'static str> {
    let parsed = url::Url::parse(href).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    SOCIAL_PLATFORMS
        .iter()
        .find(|(_, domains)| {
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        })
        .map(|(platform, _)| *platform)
}
