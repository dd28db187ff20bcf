//! Extraction tiers and the per-item pipeline.
//!
//! Tiers are attempted in order: static fetch, dynamic render with the
//! literal selector, dynamic render with the fingerprint. A tier returning
//! `Ok(None)` means "no match here, fall through"; only transport and render
//! failures are hard errors.

pub mod dynamic_tier;
pub mod pipeline;
pub mod static_tier;

use crate::fingerprint::element_text;
use scraper::{Html, Selector};
use thiserror::Error;

/// Hard extraction failures. "No match" is not an error — it is the `None`
/// value of a tier result.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// HTTP fetch failed after the retry budget, or returned a non-success
    /// status. The page is unreachable.
    #[error("fetch failed for {url}: {reason}")]
    Network { url: String, reason: String },
    /// Browser navigation or render failed for this item.
    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },
}

/// Outcome of one tier: text found, nothing matched, or a hard failure.
pub type TierResult = Result<Option<String>, ExtractError>;

/// Trimmed text of the first element matching a literal selector.
///
/// An unparseable selector counts as "no match", not an error, so a broken
/// stored selector falls through to the next tier instead of aborting.
pub fn select_first(html: &str, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    document.select(&selector).next().and_then(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_trims_text() {
        let html = r#"<div class="price">  $19.99 </div><div class="price">$2</div>"#;
        assert_eq!(select_first(html, ".price"), Some("$19.99".to_string()));
    }

    #[test]
    fn test_select_first_no_match() {
        assert_eq!(select_first("<p>hi</p>", ".price"), None);
    }

    #[test]
    fn test_select_first_empty_text_is_none() {
        assert_eq!(select_first(r#"<div class="price"> </div>"#, ".price"), None);
    }

    #[test]
    fn test_invalid_selector_is_no_match() {
        assert_eq!(select_first("<p>hi</p>", "p[[["), None);
    }
}
