//! `vigil check <item-id>` — extract one item immediately.

use super::output;
use crate::config::Config;
use crate::events::EventBus;
use crate::extract::pipeline;
use crate::extract::static_tier::StaticExtractor;
use crate::renderer::RendererHandle;
use crate::store::{SqliteStore, Store};
use anyhow::{bail, Context, Result};
use tracing::warn;
use uuid::Uuid;

/// Run the full pipeline for a single item and print the snapshot.
pub async fn run(item_id: &str, no_browser: bool) -> Result<()> {
    let id = Uuid::parse_str(item_id).context("invalid item id")?;
    let config = Config::load();
    let store = SqliteStore::open(&config.db_path())?;

    let Some(item) = store.item(id)? else {
        bail!("no such item: {id}");
    };

    let statics = StaticExtractor::new(config.http_timeout_ms);
    let renderer = if no_browser {
        RendererHandle::disabled()
    } else {
        RendererHandle::new()
    };
    let bus = EventBus::new(16);

    let result = pipeline::process_item(
        &store,
        &statics,
        &renderer,
        &item,
        config.failure_threshold,
        &bus,
    )
    .await;

    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }

    let report = result?;
    if output::is_json() {
        output::print_json(&serde_json::to_value(&report.snapshot)?);
    } else if !output::is_quiet() {
        println!("status:  {}", report.snapshot.status.as_str());
        println!("tier:    {}", report.tier);
        println!("raw:     {:?}", report.snapshot.value_raw);
        match report.snapshot.value_numeric {
            Some(v) => println!("numeric: {v}"),
            None => println!("numeric: -"),
        }
        if report.repair_due {
            println!("note: failure threshold crossed, repair is due");
        }
    }

    Ok(())
}
