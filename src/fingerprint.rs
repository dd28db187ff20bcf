//! Fingerprint matcher — relocate content from a structural DOM path.
//!
//! When an item's literal selector stops matching, the stored ancestor chain
//! is rebuilt into one composite CSS selector and queried against the
//! rendered document. The match succeeds only when exactly one element
//! resolves; ambiguity is never resolved by guessing.

use crate::model::Fingerprint;
use crate::numeric::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};

/// Collapsed, trimmed visible text of an element. `None` when empty.
pub fn element_text(el: ElementRef) -> Option<String> {
    let text = collapse_whitespace(&el.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Only classes that are plain CSS identifiers survive into a fragment;
/// anything else would produce an unparseable selector.
fn is_css_identifier(class: &str) -> bool {
    !class.is_empty()
        && !class.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && class
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build one selector fragment from a node descriptor:
/// `tag.class1.class2:nth-of-type(n)`.
fn fragment(node: &crate::model::NodeDescriptor) -> String {
    let mut out = node.tag.to_ascii_lowercase();
    for class in node.classes.iter().filter(|c| is_css_identifier(c)) {
        out.push('.');
        out.push_str(class);
    }
    out.push_str(&format!(":nth-of-type({})", node.nth_of_type));
    out
}

/// Reconstruct the composite selector for a fingerprint, fragments joined
/// with descendant combinators.
pub fn composite_selector(fingerprint: &Fingerprint) -> String {
    fingerprint
        .nodes
        .iter()
        .map(fragment)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Match a fingerprint against a document.
///
/// Returns the trimmed text of the element only when the composite selector
/// resolves to exactly one match; zero or multiple matches both yield `None`.
pub fn match_unique(html: &str, fingerprint: &Fingerprint) -> Option<String> {
    let selector = Selector::parse(&composite_selector(fingerprint)).ok()?;
    let document = Html::parse_document(html);
    let mut matches = document.select(&selector);
    let first = matches.next()?;
    if matches.next().is_some() {
        tracing::debug!("fingerprint selector matched more than one element");
        return None;
    }
    element_text(first)
}
