//! Per-item extraction pipeline and the batch run loop.
//!
//! One invocation per item writes exactly one snapshot, whatever happens:
//! text found (`ok`), nothing matched anywhere (`missing`), or a hard fetch
//! or render failure (`error`). Health counters move here too: success
//! resets them, failure increments them through the same failure-reporting
//! operation the live path uses, and crossing the threshold hands the item
//! to the repair orchestrator.

use super::dynamic_tier;
use super::static_tier::StaticExtractor;
use crate::config::Config;
use crate::events::{EventBus, VigilEvent};
use crate::model::{Snapshot, SnapshotStatus, TrackedItem, TriggerEvent};
use crate::numeric::parse_numeric;
use crate::renderer::RendererHandle;
use crate::repair::{self, RepairOutcome, RepairProposer};
use crate::store::Store;
use crate::triggers;
use anyhow::Result;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of processing one item.
pub struct ItemReport {
    /// The single snapshot written by this invocation.
    pub snapshot: Snapshot,
    /// Trigger events fired off this snapshot.
    pub fired: Vec<TriggerEvent>,
    /// The failure threshold was crossed; repair should run.
    pub repair_due: bool,
    /// Which tier resolved the value: "static", "dynamic", or "none".
    pub tier: &'static str,
}

/// Aggregate numbers for a batch run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub ok: usize,
    pub missing: usize,
    pub error: usize,
    pub triggers_fired: usize,
    pub repairs_attempted: usize,
    pub repairs_applied: usize,
}

/// Process one tracked item: static tier, then dynamic, then classify.
pub async fn process_item(
    store: &dyn Store,
    statics: &StaticExtractor,
    renderer: &RendererHandle,
    item: &TrackedItem,
    failure_threshold: u32,
    bus: &EventBus,
) -> Result<ItemReport> {
    let start = Instant::now();
    let mut tier = "none";

    let outcome = match statics.extract(&item.url, &item.selector).await {
        Ok(Some(text)) => {
            tier = "static";
            Ok(Some(text))
        }
        // Static saw the page but found nothing — fall through to the
        // dynamic tier if a browser is available.
        Ok(None) => match renderer.get().await {
            Some(engine) => match dynamic_tier::extract(engine.as_ref(), item).await {
                Ok(Some(text)) => {
                    tier = "dynamic";
                    Ok(Some(text))
                }
                other => other,
            },
            None => {
                debug!("no browser available, skipping dynamic tier for {}", item.id);
                Ok(None)
            }
        },
        Err(e) => Err(e),
    };

    let snapshot = match &outcome {
        Ok(Some(text)) => Snapshot::new(
            item.id,
            SnapshotStatus::Ok,
            text.clone(),
            parse_numeric(text),
        ),
        Ok(None) => Snapshot::new(item.id, SnapshotStatus::Missing, String::new(), None),
        Err(e) => {
            warn!("extraction failed for {}: {e}", item.id);
            Snapshot::new(item.id, SnapshotStatus::Error, String::new(), None)
        }
    };

    store.insert_snapshot(&snapshot)?;

    let mut fired = Vec::new();
    let mut repair_due = false;
    match snapshot.status {
        SnapshotStatus::Ok => {
            store.mark_success(item.id, snapshot.taken_at)?;
            // Evaluate against the snapshot just written, not a re-read.
            fired = triggers::evaluate(store, &snapshot, bus)?;
        }
        SnapshotStatus::Missing | SnapshotStatus::Error => {
            let report = store.record_failure(item.id, snapshot.taken_at, failure_threshold)?;
            repair_due = report.threshold_crossed && item.is_active;
            debug!(
                "item {} failure #{} (threshold {})",
                item.id, report.consecutive_failures, failure_threshold
            );
        }
    }

    bus.emit(VigilEvent::ItemExtracted {
        item_id: item.id.to_string(),
        status: snapshot.status.as_str().to_string(),
        value_raw: snapshot.value_raw.clone(),
        value_numeric: snapshot.value_numeric,
        tier: tier.to_string(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    });

    Ok(ItemReport {
        snapshot,
        fired,
        repair_due,
        tier,
    })
}

/// Process every active item sequentially.
///
/// A per-item failure never aborts the run. The caller owns the renderer
/// handle and must shut it down after this returns, success or failure.
pub async fn run_batch(
    store: &dyn Store,
    statics: &StaticExtractor,
    renderer: &RendererHandle,
    proposer: Option<&dyn RepairProposer>,
    config: &Config,
    bus: &EventBus,
) -> Result<RunSummary> {
    let items = store.active_items()?;
    let start = Instant::now();
    info!("starting run over {} active items", items.len());
    bus.emit(VigilEvent::RunStarted {
        item_count: items.len(),
    });

    let mut summary = RunSummary::default();
    for item in &items {
        let report = match process_item(
            store,
            statics,
            renderer,
            item,
            config.failure_threshold,
            bus,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("processing failed for item {}: {e:#}", item.id);
                continue;
            }
        };

        match report.snapshot.status {
            SnapshotStatus::Ok => summary.ok += 1,
            SnapshotStatus::Missing => summary.missing += 1,
            SnapshotStatus::Error => summary.error += 1,
        }
        summary.triggers_fired += report.fired.len();

        if report.repair_due {
            let Some(proposer) = proposer else {
                debug!("repair due for {} but no collaborator configured", item.id);
                continue;
            };
            summary.repairs_attempted += 1;
            match repair::run(store, proposer, item.id, config.repair_timeout_ms, bus).await {
                Ok(RepairOutcome::Repaired { .. }) => summary.repairs_applied += 1,
                Ok(RepairOutcome::NoViableRepair) => {}
                Err(e) => warn!("repair failed for item {}: {e:#}", item.id),
            }
        }
    }

    bus.emit(VigilEvent::RunComplete {
        ok: summary.ok,
        missing: summary.missing,
        error: summary.error,
        total_ms: start.elapsed().as_millis() as u64,
    });
    info!(
        "run complete: {} ok, {} missing, {} error, {} triggers fired",
        summary.ok, summary.missing, summary.error, summary.triggers_fired
    );

    Ok(summary)
}
