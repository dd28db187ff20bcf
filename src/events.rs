// Copyright 2026 Vigil Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vigil event bus — typed events from every component.
//!
//! The EventBus is a `tokio::sync::broadcast` channel carrying
//! [`VigilEvent`] values. Any consumer — CLI progress output, log files,
//! future notification surfaces — can subscribe independently. When no
//! subscribers exist, events are silently dropped (zero overhead).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the runtime emits. Serialized to JSON for machine consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VigilEvent {
    /// A batch run over the active item list has started.
    RunStarted { item_count: usize },
    /// One item's extraction finished and its snapshot was written.
    ItemExtracted {
        item_id: String,
        status: String,
        value_raw: String,
        value_numeric: Option<f64>,
        tier: String,
        elapsed_ms: u64,
    },
    /// A threshold trigger fired.
    TriggerFired {
        trigger_id: String,
        item_id: String,
        snapshot_id: String,
        value: f64,
        threshold: f64,
        comparison: String,
    },
    /// An item crossed the failure threshold and repair is being attempted.
    RepairStarted { item_id: String, old_selector: String },
    /// A repair proposal was installed.
    RepairApplied {
        item_id: String,
        new_selector: String,
        sample_text: String,
    },
    /// The collaborator had no viable repair; the item stays failing.
    RepairDeclined { item_id: String },
    /// The run finished.
    RunComplete {
        ok: usize,
        missing: usize,
        error: usize,
        total_ms: u64,
    },
}

/// The central event bus.
pub struct EventBus {
    sender: broadcast::Sender<VigilEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: VigilEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<VigilEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = VigilEvent::TriggerFired {
            trigger_id: "t-1".into(),
            item_id: "i-1".into(),
            snapshot_id: "s-1".into(),
            value: 90.0,
            threshold: 100.0,
            comparison: "lt".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TriggerFired"));
        assert!(json.contains("90"));

        let parsed: VigilEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            VigilEvent::TriggerFired { value, .. } => assert_eq!(value, 90.0),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(VigilEvent::RunStarted { item_count: 3 });
    }

    #[test]
    fn test_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(VigilEvent::RunStarted { item_count: 2 });
        match rx.try_recv().unwrap() {
            VigilEvent::RunStarted { item_count } => assert_eq!(item_count, 2),
            _ => panic!("wrong event"),
        }
    }
}
