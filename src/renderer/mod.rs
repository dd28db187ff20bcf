//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide), plus the
//! process-wide `RendererHandle` that owns the shared engine's lifecycle.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Result of navigating to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new isolated browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine. Called exactly once, at end of run.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering one page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full rendered page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Process-wide handle to the shared rendering engine.
///
/// The engine is expensive to launch, so it is constructed lazily on first
/// use and reused across every item in a run. The run's entry point owns the
/// handle and must call [`RendererHandle::shutdown`] on every exit path.
/// A failed launch is remembered and the dynamic tier stays unavailable for
/// the rest of the run.
pub struct RendererHandle {
    enabled: bool,
    cell: OnceCell<Option<Arc<dyn Renderer>>>,
}

impl RendererHandle {
    /// A handle that will lazily launch Chromium on first use.
    pub fn new() -> Self {
        Self {
            enabled: true,
            cell: OnceCell::new(),
        }
    }

    /// A handle with the dynamic tier switched off (`--no-browser`).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            cell: OnceCell::new(),
        }
    }

    /// A handle backed by a pre-built engine. Used by tests to substitute a
    /// fake renderer.
    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            enabled: true,
            cell: OnceCell::new_with(Some(Some(renderer))),
        }
    }

    /// Get the shared engine, launching it if this is the first use.
    pub async fn get(&self) -> Option<Arc<dyn Renderer>> {
        if !self.enabled {
            return None;
        }
        self.cell
            .get_or_init(|| async {
                match chromium::ChromiumRenderer::new().await {
                    Ok(renderer) => {
                        info!("chromium renderer launched");
                        Some(Arc::new(renderer) as Arc<dyn Renderer>)
                    }
                    Err(e) => {
                        warn!("browser unavailable, dynamic tier disabled: {e:#}");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Tear down the shared engine if it was ever launched.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(Some(renderer)) = self.cell.get() {
            renderer.shutdown().await?;
        }
        Ok(())
    }
}

impl Default for RendererHandle {
    fn default() -> Self {
        Self::new()
    }
}
