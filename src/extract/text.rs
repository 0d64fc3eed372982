//! Plain text extraction.

use scraper::{ElementRef, Node};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Collect the text under `root`, skipping hidden elements.
pub(super) fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();

    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }

    collapse_whitespace(&out)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
