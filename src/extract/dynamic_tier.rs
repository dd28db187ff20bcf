//! Dynamic extraction tier — render the page, then literal selector with a
//! fingerprint fallback.
//!
//! Each item gets a fresh browsing context from the shared engine. The
//! context is closed on every code path, and a failed navigation never
//! touches the shared browser or other items.

use super::{select_first, ExtractError, TierResult};
use crate::fingerprint::match_unique;
use crate::model::TrackedItem;
use crate::renderer::{RenderContext, Renderer};
use tracing::debug;

/// Navigation timeout per item.
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Fixed delay after navigation so client-side rendering can settle.
pub const SETTLE_DELAY_MS: u64 = 1_500;

/// Render the item's page and extract its value.
///
/// Order: literal selector first match, then the fingerprint matcher against
/// the same rendered document, then `None`.
pub async fn extract(renderer: &dyn Renderer, item: &TrackedItem) -> TierResult {
    let mut ctx = renderer
        .new_context()
        .await
        .map_err(|e| ExtractError::Render {
            url: item.url.clone(),
            reason: format!("{e:#}"),
        })?;

    // No `?` between here and close(): the context must be released even
    // when extraction fails.
    let result = extract_in_context(ctx.as_mut(), item).await;
    if let Err(e) = ctx.close().await {
        debug!("failed to close browsing context: {e:#}");
    }
    result
}

async fn extract_in_context(ctx: &mut dyn RenderContext, item: &TrackedItem) -> TierResult {
    ctx.navigate(&item.url, NAVIGATION_TIMEOUT_MS)
        .await
        .map_err(|e| ExtractError::Render {
            url: item.url.clone(),
            reason: format!("{e:#}"),
        })?;

    // Settle delay runs inside the page so it also yields to pending JS.
    let settle = format!("new Promise(r => setTimeout(r, {SETTLE_DELAY_MS}))");
    let _ = ctx.execute_js(&settle).await;

    let html = ctx.get_html().await.map_err(|e| ExtractError::Render {
        url: item.url.clone(),
        reason: format!("{e:#}"),
    })?;

    if let Some(text) = select_first(&html, &item.selector) {
        return Ok(Some(text));
    }

    if let Some(fingerprint) = &item.fingerprint {
        if let Some(text) = match_unique(&html, fingerprint) {
            debug!("selector missed but fingerprint relocated the value");
            return Ok(Some(text));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fingerprint, NodeDescriptor, ValueKind};
    use crate::renderer::NavigationResult;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory renderer serving canned HTML, tracking open contexts.
    struct FakeRenderer {
        html: String,
        fail_navigation: bool,
        open_contexts: Arc<AtomicUsize>,
    }

    impl FakeRenderer {
        fn serving(html: &str) -> Self {
            Self {
                html: html.to_string(),
                fail_navigation: false,
                open_contexts: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                html: String::new(),
                fail_navigation: true,
                open_contexts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FakeContext {
        html: String,
        fail_navigation: bool,
        open_contexts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            self.open_contexts.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(FakeContext {
                html: self.html.clone(),
                fail_navigation: self.fail_navigation,
                open_contexts: Arc::clone(&self.open_contexts),
            }))
        }
        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
        fn active_contexts(&self) -> usize {
            self.open_contexts.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl RenderContext for FakeContext {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            if self.fail_navigation {
                bail!("navigation timed out");
            }
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 1,
            })
        }
        async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn get_html(&self) -> Result<String> {
            Ok(self.html.clone())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.open_contexts.fetch_sub(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn item_with_fingerprint() -> TrackedItem {
        let mut item = TrackedItem::new("https://shop.test/p/1", ".price", ValueKind::Price);
        item.fingerprint = Some(Fingerprint {
            nodes: vec![
                NodeDescriptor {
                    tag: "div".into(),
                    classes: vec!["product".into()],
                    nth_of_type: 1,
                },
                NodeDescriptor {
                    tag: "span".into(),
                    classes: vec!["amount".into()],
                    nth_of_type: 1,
                },
            ],
        });
        item
    }

    #[tokio::test]
    async fn test_literal_selector_wins() {
        let renderer =
            FakeRenderer::serving(r#"<div class="product"><span class="price">$9</span></div>"#);
        let item = item_with_fingerprint();
        let text = extract(&renderer, &item).await.unwrap();
        assert_eq!(text, Some("$9".to_string()));
        assert_eq!(renderer.active_contexts(), 0);
    }

    #[tokio::test]
    async fn test_fingerprint_fallback_when_selector_misses() {
        // Page redesign renamed .price to .amount; the structural path holds.
        let renderer =
            FakeRenderer::serving(r#"<div class="product"><span class="amount">$12</span></div>"#);
        let item = item_with_fingerprint();
        let text = extract(&renderer, &item).await.unwrap();
        assert_eq!(text, Some("$12".to_string()));
    }

    #[tokio::test]
    async fn test_nothing_matches_is_none() {
        let renderer = FakeRenderer::serving("<p>gone</p>");
        let item = item_with_fingerprint();
        let text = extract(&renderer, &item).await.unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn test_navigation_failure_closes_context() {
        let renderer = FakeRenderer::failing();
        let item = item_with_fingerprint();
        let err = extract(&renderer, &item).await.unwrap_err();
        assert!(matches!(err, ExtractError::Render { .. }));
        assert_eq!(renderer.active_contexts(), 0);
    }
}
