//! Static extraction tier — plain HTTP fetch plus a CSS selector query.
//!
//! Not a browser: no JS runs, so client-rendered values fall through to the
//! dynamic tier. One retry on transport failure or non-success status, then
//! the failure is hard.

use super::{select_first, ExtractError, TierResult};
use std::time::Duration;
use tracing::debug;

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 1;

/// Delay before the retry attempt.
const RETRY_DELAY_MS: u64 = 500;

/// HTTP fetcher shared across all items in a run.
#[derive(Clone)]
pub struct StaticExtractor {
    client: reqwest::Client,
}

impl StaticExtractor {
    /// Build a client with a descriptive identifier and bounded timeout.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = format!(
            "vigil/{} (+https://github.com/vigil-watch/vigil)",
            env!("CARGO_PKG_VERSION")
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch `url` and query `selector` against the returned markup.
    ///
    /// `Ok(None)` when the selector matches nothing or the matched text is
    /// empty — the caller falls through to the dynamic tier.
    pub async fn extract(&self, url: &str, selector: &str) -> TierResult {
        let body = self.fetch(url).await?;
        Ok(select_first(&body, selector))
    }

    /// GET with one retry, then a hard `Network` error.
    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let mut retries = 0u32;

        loop {
            let attempt = self.client.get(url).send().await;

            let reason = match attempt {
                Ok(resp) if resp.status().is_success() => {
                    return resp.text().await.map_err(|e| ExtractError::Network {
                        url: url.to_string(),
                        reason: format!("failed to read body: {e}"),
                    });
                }
                Ok(resp) => format!("status {}", resp.status().as_u16()),
                Err(e) => format!("{e}"),
            };

            if retries < MAX_RETRIES {
                retries += 1;
                debug!("fetch attempt {retries} failed for {url}: {reason}, retrying");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                continue;
            }

            return Err(ExtractError::Network {
                url: url.to_string(),
                reason,
            });
        }
    }
}
