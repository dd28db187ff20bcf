//! Trigger evaluator — at-most-once threshold alerts over fresh readings.
//!
//! Runs against the snapshot the pipeline just wrote, never a re-fetched
//! "latest" one, so a concurrently inserted reading can never be evaluated
//! by mistake. A trigger with `last_fired_at` set stays dormant forever;
//! re-arming is an external concern.

use crate::events::{EventBus, VigilEvent};
use crate::model::{Snapshot, SnapshotStatus, TriggerEvent};
use crate::store::Store;
use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Evaluate all armed triggers of the snapshot's item.
///
/// Only `ok` snapshots carrying a numeric value are considered. For each
/// match, exactly one [`TriggerEvent`] is created and the trigger's latch is
/// stamped.
pub fn evaluate(store: &dyn Store, snapshot: &Snapshot, bus: &EventBus) -> Result<Vec<TriggerEvent>> {
    if snapshot.status != SnapshotStatus::Ok {
        return Ok(Vec::new());
    }
    let Some(value) = snapshot.value_numeric else {
        return Ok(Vec::new());
    };

    let mut fired = Vec::new();
    for trigger in store.armed_triggers(snapshot.item_id)? {
        if !trigger.comparison.matches(value, trigger.threshold) {
            continue;
        }

        let event = TriggerEvent {
            id: Uuid::new_v4(),
            trigger_id: trigger.id,
            snapshot_id: snapshot.id,
            value,
            threshold: trigger.threshold,
            comparison: trigger.comparison,
            fired_at: Utc::now(),
        };
        store.insert_trigger_event(&event)?;
        store.mark_trigger_fired(trigger.id, event.fired_at)?;

        info!(
            "trigger {} fired: {} {} {}",
            trigger.id,
            value,
            trigger.comparison.as_str(),
            trigger.threshold
        );
        bus.emit(VigilEvent::TriggerFired {
            trigger_id: trigger.id.to_string(),
            item_id: snapshot.item_id.to_string(),
            snapshot_id: snapshot.id.to_string(),
            value,
            threshold: trigger.threshold,
            comparison: trigger.comparison.as_str().to_string(),
        });
        fired.push(event);
    }

    Ok(fired)
}
