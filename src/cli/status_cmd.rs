//! `vigil status` — items, health counters, and latest readings.

use super::output;
use crate::config::Config;
use crate::store::{SqliteStore, Store};
use anyhow::Result;

/// Print every active item with its health state and newest snapshot.
pub async fn run() -> Result<()> {
    let config = Config::load();
    let store = SqliteStore::open(&config.db_path())?;
    let items = store.active_items()?;

    if output::is_json() {
        let mut rows = Vec::new();
        for item in &items {
            let latest = store.snapshots(item.id, 1)?.into_iter().next();
            rows.push(serde_json::json!({
                "item": item,
                "latest_snapshot": latest,
            }));
        }
        output::print_json(&serde_json::Value::Array(rows));
        return Ok(());
    }

    if output::is_quiet() {
        return Ok(());
    }

    if items.is_empty() {
        println!("no active items");
        return Ok(());
    }

    for item in &items {
        let latest = store.snapshots(item.id, 1)?.into_iter().next();
        println!("{}  {}", item.id, item.url);
        println!("  selector: {}", item.selector);
        println!(
            "  health:   {} consecutive failures{}",
            item.consecutive_failures,
            item.last_success_at
                .map(|t| format!(", last success {t}"))
                .unwrap_or_default()
        );
        match latest {
            Some(snap) => println!(
                "  latest:   [{}] {:?} at {}",
                snap.status.as_str(),
                snap.value_raw,
                snap.taken_at
            ),
            None => println!("  latest:   (no snapshots yet)"),
        }
    }

    Ok(())
}
