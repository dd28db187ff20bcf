//! `vigil repair <item-id>` — ask the collaborator for a replacement selector.

use super::output;
use crate::config::Config;
use crate::events::EventBus;
use crate::repair::{self, RemoteProposer, RepairOutcome};
use crate::store::SqliteStore;
use anyhow::{bail, Context, Result};
use uuid::Uuid;

/// Run the repair orchestrator for one item on direct request.
pub async fn run(item_id: &str) -> Result<()> {
    let id = Uuid::parse_str(item_id).context("invalid item id")?;
    let config = Config::load();
    let Some(url) = config.repair_url.as_deref() else {
        bail!("no repair collaborator configured (set VIGIL_REPAIR_URL)");
    };

    let store = SqliteStore::open(&config.db_path())?;
    let proposer = RemoteProposer::new(url, config.repair_timeout_ms);
    let bus = EventBus::new(16);

    match repair::run(&store, &proposer, id, config.repair_timeout_ms, &bus).await? {
        RepairOutcome::Repaired { snapshot } => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "repaired": true,
                    "snapshot": snapshot,
                }));
            } else if !output::is_quiet() {
                println!("repaired: new sample {:?}", snapshot.value_raw);
            }
        }
        RepairOutcome::NoViableRepair => {
            if output::is_json() {
                output::print_json(&serde_json::json!({ "repaired": false }));
            } else if !output::is_quiet() {
                println!("no viable repair; item left unchanged");
            }
        }
    }

    Ok(())
}
