//! Core data model — tracked items, snapshots, triggers, fingerprints.
//!
//! Items and triggers are created and deleted by external collaborators;
//! the runtime only mutates item health/selector fields and stamps triggers.
//! Snapshots and trigger events are append-only and never touched after
//! creation.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum ancestor-chain depth a fingerprint may carry.
pub const MAX_FINGERPRINT_DEPTH: usize = 12;

/// Maximum number of classes per fingerprint node.
pub const MAX_NODE_CLASSES: usize = 3;

/// Declared value type of a tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Price,
    Number,
    Text,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Price => "price",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "price" => Ok(ValueKind::Price),
            "number" => Ok(ValueKind::Number),
            "text" => Ok(ValueKind::Text),
            other => bail!("unknown value kind: {other}"),
        }
    }
}

/// One monitored (URL, selector) pair with health state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: Uuid,
    /// Page the value lives on.
    pub url: String,
    /// Literal CSS selector for the value element.
    pub selector: String,
    /// Structural path fallback, captured at selection time.
    pub fingerprint: Option<Fingerprint>,
    pub kind: ValueKind,
    /// Last known-good text at the selector, used as repair context.
    pub sample_text: Option<String>,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TrackedItem {
    /// Construct a fresh, healthy item.
    pub fn new(url: impl Into<String>, selector: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            selector: selector.into(),
            fingerprint: None,
            kind,
            sample_text: None,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            is_active: true,
        }
    }
}

/// Outcome class of one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// Text was captured (numeric value optional).
    Ok,
    /// Page reachable but no element/text matched.
    Missing,
    /// Fetch or render failed outright.
    Error,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Ok => "ok",
            SnapshotStatus::Missing => "missing",
            SnapshotStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ok" => Ok(SnapshotStatus::Ok),
            "missing" => Ok(SnapshotStatus::Missing),
            "error" => Ok(SnapshotStatus::Error),
            other => bail!("unknown snapshot status: {other}"),
        }
    }
}

/// One immutable, timestamped extraction reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub item_id: Uuid,
    pub value_raw: String,
    /// Present only when `status == Ok` and the numeric parser succeeded.
    pub value_numeric: Option<f64>,
    pub status: SnapshotStatus,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        item_id: Uuid,
        status: SnapshotStatus,
        value_raw: String,
        value_numeric: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            value_raw,
            value_numeric: if status == SnapshotStatus::Ok {
                value_numeric
            } else {
                None
            },
            status,
            taken_at: Utc::now(),
        }
    }
}

/// One step of a structural DOM path.
///
/// Field names are the wire format consumed from the selection frontend —
/// do not rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    pub nth_of_type: u32,
}

/// Ordered ancestor chain down to the target element.
///
/// Created once at selection time by the frontend and passed through
/// unchanged; the matcher consumes it read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    pub nodes: Vec<NodeDescriptor>,
}

impl Fingerprint {
    /// Validate shape at the system boundary, before the matcher sees it.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("fingerprint has no nodes");
        }
        if self.nodes.len() > MAX_FINGERPRINT_DEPTH {
            bail!(
                "fingerprint depth {} exceeds maximum {}",
                self.nodes.len(),
                MAX_FINGERPRINT_DEPTH
            );
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.tag.trim().is_empty() {
                bail!("fingerprint node {i} has an empty tag");
            }
            if node.classes.len() > MAX_NODE_CLASSES {
                bail!(
                    "fingerprint node {i} carries {} classes (max {})",
                    node.classes.len(),
                    MAX_NODE_CLASSES
                );
            }
            if node.nth_of_type < 1 {
                bail!("fingerprint node {i} has nth_of_type {}", node.nth_of_type);
            }
        }
        Ok(())
    }
}

/// Threshold comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl Comparison {
    /// Standard decimal comparison of a captured value against the threshold.
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Lt => value < threshold,
            Comparison::Lte => value <= threshold,
            Comparison::Gt => value > threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Eq => value == threshold,
            Comparison::Neq => value != threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Eq => "eq",
            Comparison::Neq => "neq",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "lt" => Ok(Comparison::Lt),
            "lte" => Ok(Comparison::Lte),
            "gt" => Ok(Comparison::Gt),
            "gte" => Ok(Comparison::Gte),
            "eq" => Ok(Comparison::Eq),
            "neq" => Ok(Comparison::Neq),
            other => bail!("unknown comparison: {other}"),
        }
    }
}

/// A threshold rule over an item's numeric readings.
///
/// `last_fired_at` is a latch: once set, the trigger is permanently dormant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub item_id: Uuid,
    pub comparison: Comparison,
    pub threshold: f64,
    pub active: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl Trigger {
    pub fn new(item_id: Uuid, comparison: Comparison, threshold: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            comparison,
            threshold,
            active: true,
            last_fired_at: None,
        }
    }
}

/// Immutable audit record linking one trigger firing to the snapshot that
/// caused it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub snapshot_id: Uuid,
    pub value: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub fired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_numeric_cleared_unless_ok() {
        let item = Uuid::new_v4();
        let snap = Snapshot::new(item, SnapshotStatus::Missing, String::new(), Some(5.0));
        assert!(snap.value_numeric.is_none());

        let snap = Snapshot::new(item, SnapshotStatus::Ok, "5".into(), Some(5.0));
        assert_eq!(snap.value_numeric, Some(5.0));
    }

    #[test]
    fn test_comparison_semantics() {
        assert!(Comparison::Lt.matches(90.0, 100.0));
        assert!(!Comparison::Lt.matches(100.0, 100.0));
        assert!(Comparison::Lte.matches(100.0, 100.0));
        assert!(Comparison::Gt.matches(101.0, 100.0));
        assert!(Comparison::Gte.matches(100.0, 100.0));
        assert!(Comparison::Eq.matches(19.99, 19.99));
        assert!(Comparison::Neq.matches(20.0, 19.99));
    }

    #[test]
    fn test_fingerprint_wire_format() {
        let json = r#"[
            {"tag": "div", "classes": ["product", "card"], "nthOfType": 2},
            {"tag": "span", "classes": ["price"], "nthOfType": 1}
        ]"#;
        let fp: Fingerprint = serde_json::from_str(json).unwrap();
        assert_eq!(fp.nodes.len(), 2);
        assert_eq!(fp.nodes[0].nth_of_type, 2);
        fp.validate().unwrap();

        // Roundtrip keeps the exact field names
        let out = serde_json::to_string(&fp).unwrap();
        assert!(out.contains("nthOfType"));
        assert!(out.contains("classes"));
    }

    #[test]
    fn test_fingerprint_validation_rejects_malformed() {
        let empty = Fingerprint { nodes: vec![] };
        assert!(empty.validate().is_err());

        let deep = Fingerprint {
            nodes: (0..MAX_FINGERPRINT_DEPTH + 1)
                .map(|_| NodeDescriptor {
                    tag: "div".into(),
                    classes: vec![],
                    nth_of_type: 1,
                })
                .collect(),
        };
        assert!(deep.validate().is_err());

        let crowded = Fingerprint {
            nodes: vec![NodeDescriptor {
                tag: "div".into(),
                classes: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                nth_of_type: 1,
            }],
        };
        assert!(crowded.validate().is_err());

        let zero_nth = Fingerprint {
            nodes: vec![NodeDescriptor {
                tag: "div".into(),
                classes: vec![],
                nth_of_type: 0,
            }],
        };
        assert!(zero_nth.validate().is_err());
    }

    #[test]
    fn test_value_kind_roundtrip() {
        for kind in [ValueKind::Price, ValueKind::Number, ValueKind::Text] {
            assert_eq!(ValueKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(ValueKind::parse("currency").is_err());
    }
}
