//! `vigil run` — one batch pass over every active item.

use super::output;
use crate::config::Config;
use crate::events::EventBus;
use crate::extract::pipeline;
use crate::extract::static_tier::StaticExtractor;
use crate::renderer::RendererHandle;
use crate::repair::{RemoteProposer, RepairProposer};
use crate::store::SqliteStore;
use anyhow::Result;
use tracing::warn;

/// Run the batch pipeline and report a summary.
pub async fn run(no_browser: bool) -> Result<()> {
    let config = Config::load();
    let store = SqliteStore::open(&config.db_path())?;
    let statics = StaticExtractor::new(config.http_timeout_ms);
    let renderer = if no_browser {
        RendererHandle::disabled()
    } else {
        RendererHandle::new()
    };
    let proposer: Option<RemoteProposer> = config
        .repair_url
        .as_deref()
        .map(|url| RemoteProposer::new(url, config.repair_timeout_ms));
    let bus = EventBus::new(64);

    let result = pipeline::run_batch(
        &store,
        &statics,
        &renderer,
        proposer.as_ref().map(|p| p as &dyn RepairProposer),
        &config,
        &bus,
    )
    .await;

    // The shared browser is released on every exit path, including a failed
    // run.
    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }

    let summary = result?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "ok": summary.ok,
            "missing": summary.missing,
            "error": summary.error,
            "triggers_fired": summary.triggers_fired,
            "repairs_attempted": summary.repairs_attempted,
            "repairs_applied": summary.repairs_applied,
        }));
    } else if !output::is_quiet() {
        println!(
            "run complete: {} ok, {} missing, {} error",
            summary.ok, summary.missing, summary.error
        );
        if summary.triggers_fired > 0 {
            println!("  triggers fired:    {}", summary.triggers_fired);
        }
        if summary.repairs_attempted > 0 {
            println!(
                "  repairs:           {} applied / {} attempted",
                summary.repairs_applied, summary.repairs_attempted
            );
        }
    }

    Ok(())
}
