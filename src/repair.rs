//! Repair orchestrator — selector rehabilitation via an external collaborator.
//!
//! The collaborator (an AI service behind [`RepairProposer`]) is given the
//! item's URL, its broken selector, the best known sample text, and the
//! stored fingerprint. A returned proposal is installed atomically together
//! with one immediate `ok` snapshot; no proposal leaves the item untouched
//! and failing.

use crate::events::{EventBus, VigilEvent};
use crate::model::{Fingerprint, Snapshot, SnapshotStatus, TrackedItem, ValueKind};
use crate::numeric::parse_numeric;
use crate::store::Store;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Context handed to the repair collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct RepairRequest {
    pub url: String,
    pub current_selector: String,
    /// Most recent `ok` snapshot's raw text, else the item's stored sample.
    pub sample_text: Option<String>,
    pub fingerprint: Option<Fingerprint>,
}

/// A replacement selector offered by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairProposal {
    pub selector: String,
    pub sample_text: String,
    #[serde(default)]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub numeric: Option<f64>,
}

/// The external AI repair collaborator. Pure request/response; any latency
/// bound is the caller's.
#[async_trait]
pub trait RepairProposer: Send + Sync {
    async fn propose(&self, request: &RepairRequest) -> Result<Option<RepairProposal>>;
}

/// Outcome of one repair attempt.
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    /// The proposal was installed; this snapshot was created from it.
    Repaired { snapshot: Snapshot },
    /// The collaborator had nothing viable; item state is unchanged.
    NoViableRepair,
}

/// Attempt to repair one item.
pub async fn run(
    store: &dyn Store,
    proposer: &dyn RepairProposer,
    item_id: Uuid,
    timeout_ms: u64,
    bus: &EventBus,
) -> Result<RepairOutcome> {
    let Some(item) = store.item(item_id)? else {
        bail!("unknown item: {item_id}");
    };

    let request = build_request(store, &item)?;
    bus.emit(VigilEvent::RepairStarted {
        item_id: item.id.to_string(),
        old_selector: item.selector.clone(),
    });

    let proposal = match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        proposer.propose(&request),
    )
    .await
    {
        Ok(result) => result.context("repair collaborator failed")?,
        Err(_) => {
            warn!("repair collaborator timed out after {timeout_ms}ms for {item_id}");
            None
        }
    };

    let Some(proposal) = proposal else {
        info!("no viable repair for {item_id}, leaving item failing");
        bus.emit(VigilEvent::RepairDeclined {
            item_id: item.id.to_string(),
        });
        return Ok(RepairOutcome::NoViableRepair);
    };

    let kind = proposal.kind.unwrap_or(item.kind);
    let numeric = proposal.numeric.or_else(|| parse_numeric(&proposal.sample_text));
    let snapshot = Snapshot::new(
        item.id,
        SnapshotStatus::Ok,
        proposal.sample_text.clone(),
        numeric,
    );

    store.apply_repair(item.id, &proposal.selector, &proposal.sample_text, kind, &snapshot)?;

    info!(
        "repaired item {}: selector {:?} -> {:?}",
        item.id, item.selector, proposal.selector
    );
    bus.emit(VigilEvent::RepairApplied {
        item_id: item.id.to_string(),
        new_selector: proposal.selector,
        sample_text: proposal.sample_text,
    });

    Ok(RepairOutcome::Repaired { snapshot })
}

/// Assemble collaborator context, preferring live snapshot text over the
/// stored sample.
fn build_request(store: &dyn Store, item: &TrackedItem) -> Result<RepairRequest> {
    let sample_text = store
        .latest_ok_snapshot(item.id)?
        .map(|s| s.value_raw)
        .filter(|raw| !raw.is_empty())
        .or_else(|| item.sample_text.clone());

    Ok(RepairRequest {
        url: item.url.clone(),
        current_selector: item.selector.clone(),
        sample_text,
        fingerprint: item.fingerprint.clone(),
    })
}

/// HTTP-backed proposer: POSTs the request as JSON and expects either a
/// proposal object or JSON `null` back.
pub struct RemoteProposer {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteProposer {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RepairProposer for RemoteProposer {
    async fn propose(&self, request: &RepairRequest) -> Result<Option<RepairProposal>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("repair endpoint unreachable")?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("repair endpoint returned status {}", response.status());
        }

        let proposal: Option<RepairProposal> = response
            .json()
            .await
            .context("repair endpoint returned malformed JSON")?;
        Ok(proposal)
    }
}
