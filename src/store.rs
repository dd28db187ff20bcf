//! Persistence — the `Store` trait and its SQLite implementation.
//!
//! Items and triggers are mutated only through the narrow operations here;
//! snapshots and trigger events are insert-only and have no update or delete
//! paths at all.

use crate::model::{
    Comparison, Fingerprint, Snapshot, SnapshotStatus, TrackedItem, Trigger, TriggerEvent,
    ValueKind,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Result of recording one failure against an item.
///
/// This is the failure-reporting entry point of the runtime: the batch
/// pipeline calls it on `missing`/`error` outcomes, and live external paths
/// may call it directly. `threshold_crossed` signals that the repair
/// orchestrator should run.
#[derive(Debug, Clone, Copy)]
pub struct FailureReport {
    pub consecutive_failures: u32,
    pub threshold_crossed: bool,
}

/// Storage operations the runtime needs.
pub trait Store: Send + Sync {
    fn create_item(&self, item: &TrackedItem) -> Result<()>;
    fn item(&self, id: Uuid) -> Result<Option<TrackedItem>>;
    fn active_items(&self) -> Result<Vec<TrackedItem>>;
    /// Reset the failure counter and stamp `last_success_at`.
    fn mark_success(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// Increment the failure counter, stamp `last_failure_at`, and report
    /// whether `threshold` has been reached.
    fn record_failure(&self, item_id: Uuid, at: DateTime<Utc>, threshold: u32)
        -> Result<FailureReport>;
    /// Atomically install a repair proposal: replace selector/sample/kind,
    /// reset health, and insert the accompanying `ok` snapshot.
    fn apply_repair(
        &self,
        item_id: Uuid,
        selector: &str,
        sample_text: &str,
        kind: ValueKind,
        snapshot: &Snapshot,
    ) -> Result<()>;

    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
    fn latest_ok_snapshot(&self, item_id: Uuid) -> Result<Option<Snapshot>>;
    /// Most recent snapshots for an item, newest first.
    fn snapshots(&self, item_id: Uuid, limit: u32) -> Result<Vec<Snapshot>>;

    fn create_trigger(&self, trigger: &Trigger) -> Result<()>;
    /// Active triggers that have never fired, for one item.
    fn armed_triggers(&self, item_id: Uuid) -> Result<Vec<Trigger>>;
    fn mark_trigger_fired(&self, trigger_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    fn insert_trigger_event(&self, event: &TriggerEvent) -> Result<()>;
    fn trigger_events(&self, trigger_id: Uuid) -> Result<Vec<TriggerEvent>>;
}

/// SQLite-backed store. A single connection serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory store, for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                selector TEXT NOT NULL,
                fingerprint TEXT,
                kind TEXT NOT NULL,
                sample_text TEXT,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                last_success_at TEXT,
                last_failure_at TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES items(id),
                value_raw TEXT NOT NULL,
                value_numeric REAL,
                status TEXT NOT NULL,
                taken_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_item ON snapshots(item_id, taken_at);
            CREATE TABLE IF NOT EXISTS triggers (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES items(id),
                comparison TEXT NOT NULL,
                threshold REAL NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                last_fired_at TEXT
            );
            CREATE TABLE IF NOT EXISTS trigger_events (
                id TEXT PRIMARY KEY,
                trigger_id TEXT NOT NULL REFERENCES triggers(id),
                snapshot_id TEXT NOT NULL REFERENCES snapshots(id),
                value REAL NOT NULL,
                threshold REAL NOT NULL,
                comparison TEXT NOT NULL,
                fired_at TEXT NOT NULL
            );",
        )
        .context("failed to create schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp in store: {s}"))?
        .with_timezone(&Utc))
}

fn opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|v| parse_ts(&v)).transpose()
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("bad id in store: {s}"))
}

fn row_to_item(row: &Row<'_>) -> Result<TrackedItem> {
    let fingerprint: Option<String> = row.get("fingerprint")?;
    let fingerprint: Option<Fingerprint> = fingerprint
        .map(|json| serde_json::from_str(&json).context("bad fingerprint in store"))
        .transpose()?;
    let kind: String = row.get("kind")?;
    let last_success_at: Option<String> = row.get("last_success_at")?;
    let last_failure_at: Option<String> = row.get("last_failure_at")?;
    let id: String = row.get("id")?;

    Ok(TrackedItem {
        id: parse_id(&id)?,
        url: row.get("url")?,
        selector: row.get("selector")?,
        fingerprint,
        kind: ValueKind::parse(&kind)?,
        sample_text: row.get("sample_text")?,
        consecutive_failures: row.get("consecutive_failures")?,
        last_success_at: opt_ts(last_success_at)?,
        last_failure_at: opt_ts(last_failure_at)?,
        is_active: row.get("is_active")?,
    })
}

fn row_to_snapshot(row: &Row<'_>) -> Result<Snapshot> {
    let id: String = row.get("id")?;
    let item_id: String = row.get("item_id")?;
    let status: String = row.get("status")?;
    let taken_at: String = row.get("taken_at")?;

    Ok(Snapshot {
        id: parse_id(&id)?,
        item_id: parse_id(&item_id)?,
        value_raw: row.get("value_raw")?,
        value_numeric: row.get("value_numeric")?,
        status: SnapshotStatus::parse(&status)?,
        taken_at: parse_ts(&taken_at)?,
    })
}

fn row_to_trigger(row: &Row<'_>) -> Result<Trigger> {
    let id: String = row.get("id")?;
    let item_id: String = row.get("item_id")?;
    let comparison: String = row.get("comparison")?;
    let last_fired_at: Option<String> = row.get("last_fired_at")?;

    Ok(Trigger {
        id: parse_id(&id)?,
        item_id: parse_id(&item_id)?,
        comparison: Comparison::parse(&comparison)?,
        threshold: row.get("threshold")?,
        active: row.get("active")?,
        last_fired_at: opt_ts(last_fired_at)?,
    })
}

fn insert_snapshot_tx(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshots (id, item_id, value_raw, value_numeric, status, taken_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            snapshot.id.to_string(),
            snapshot.item_id.to_string(),
            snapshot.value_raw,
            snapshot.value_numeric,
            snapshot.status.as_str(),
            ts(snapshot.taken_at),
        ],
    )
    .context("failed to insert snapshot")?;
    Ok(())
}

impl Store for SqliteStore {
    fn create_item(&self, item: &TrackedItem) -> Result<()> {
        if let Some(fp) = &item.fingerprint {
            fp.validate()?;
        }
        let fingerprint = item
            .fingerprint
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.lock().execute(
            "INSERT INTO items (id, url, selector, fingerprint, kind, sample_text,
                                consecutive_failures, last_success_at, last_failure_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id.to_string(),
                item.url,
                item.selector,
                fingerprint,
                item.kind.as_str(),
                item.sample_text,
                item.consecutive_failures,
                item.last_success_at.map(ts),
                item.last_failure_at.map(ts),
                item.is_active,
            ],
        )?;
        Ok(())
    }

    fn item(&self, id: Uuid) -> Result<Option<TrackedItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM items WHERE id = ?1")?;
        let mut rows = stmt.query(params![id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_item(row)?)),
            None => Ok(None),
        }
    }

    fn active_items(&self) -> Result<Vec<TrackedItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM items WHERE is_active = 1 ORDER BY rowid")?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(row_to_item(row)?);
        }
        Ok(items)
    }

    fn mark_success(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.lock().execute(
            "UPDATE items SET consecutive_failures = 0, last_success_at = ?2 WHERE id = ?1",
            params![item_id.to_string(), ts(at)],
        )?;
        Ok(())
    }

    fn record_failure(
        &self,
        item_id: Uuid,
        at: DateTime<Utc>,
        threshold: u32,
    ) -> Result<FailureReport> {
        let conn = self.lock();
        conn.execute(
            "UPDATE items SET consecutive_failures = consecutive_failures + 1,
                              last_failure_at = ?2
             WHERE id = ?1",
            params![item_id.to_string(), ts(at)],
        )?;
        let consecutive_failures: u32 = conn.query_row(
            "SELECT consecutive_failures FROM items WHERE id = ?1",
            params![item_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(FailureReport {
            consecutive_failures,
            threshold_crossed: consecutive_failures >= threshold,
        })
    }

    fn apply_repair(
        &self,
        item_id: Uuid,
        selector: &str,
        sample_text: &str,
        kind: ValueKind,
        snapshot: &Snapshot,
    ) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE items SET selector = ?2, sample_text = ?3, kind = ?4,
                              consecutive_failures = 0, last_success_at = ?5
             WHERE id = ?1",
            params![
                item_id.to_string(),
                selector,
                sample_text,
                kind.as_str(),
                ts(snapshot.taken_at),
            ],
        )?;
        insert_snapshot_tx(&tx, snapshot)?;
        tx.commit().context("failed to commit repair")?;
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        insert_snapshot_tx(&self.lock(), snapshot)
    }

    fn latest_ok_snapshot(&self, item_id: Uuid) -> Result<Option<Snapshot>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM snapshots WHERE item_id = ?1 AND status = 'ok'
             ORDER BY taken_at DESC, rowid DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![item_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_snapshot(row)?)),
            None => Ok(None),
        }
    }

    fn snapshots(&self, item_id: Uuid, limit: u32) -> Result<Vec<Snapshot>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM snapshots WHERE item_id = ?1
             ORDER BY taken_at DESC, rowid DESC LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![item_id.to_string(), limit])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(row_to_snapshot(row)?);
        }
        Ok(snapshots)
    }

    fn create_trigger(&self, trigger: &Trigger) -> Result<()> {
        self.lock().execute(
            "INSERT INTO triggers (id, item_id, comparison, threshold, active, last_fired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trigger.id.to_string(),
                trigger.item_id.to_string(),
                trigger.comparison.as_str(),
                trigger.threshold,
                trigger.active,
                trigger.last_fired_at.map(ts),
            ],
        )?;
        Ok(())
    }

    fn armed_triggers(&self, item_id: Uuid) -> Result<Vec<Trigger>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM triggers
             WHERE item_id = ?1 AND active = 1 AND last_fired_at IS NULL
             ORDER BY rowid",
        )?;
        let mut rows = stmt.query(params![item_id.to_string()])?;
        let mut triggers = Vec::new();
        while let Some(row) = rows.next()? {
            triggers.push(row_to_trigger(row)?);
        }
        Ok(triggers)
    }

    fn mark_trigger_fired(&self, trigger_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.lock().execute(
            "UPDATE triggers SET last_fired_at = ?2 WHERE id = ?1",
            params![trigger_id.to_string(), ts(at)],
        )?;
        Ok(())
    }

    fn insert_trigger_event(&self, event: &TriggerEvent) -> Result<()> {
        self.lock().execute(
            "INSERT INTO trigger_events
                 (id, trigger_id, snapshot_id, value, threshold, comparison, fired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.trigger_id.to_string(),
                event.snapshot_id.to_string(),
                event.value,
                event.threshold,
                event.comparison.as_str(),
                ts(event.fired_at),
            ],
        )?;
        Ok(())
    }

    fn trigger_events(&self, trigger_id: Uuid) -> Result<Vec<TriggerEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM trigger_events WHERE trigger_id = ?1 ORDER BY rowid",
        )?;
        let mut rows = stmt.query(params![trigger_id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("id")?;
            let trigger_id: String = row.get("trigger_id")?;
            let snapshot_id: String = row.get("snapshot_id")?;
            let comparison: String = row.get("comparison")?;
            let fired_at: String = row.get("fired_at")?;
            events.push(TriggerEvent {
                id: parse_id(&id)?,
                trigger_id: parse_id(&trigger_id)?,
                snapshot_id: parse_id(&snapshot_id)?,
                value: row.get("value")?,
                threshold: row.get("threshold")?,
                comparison: Comparison::parse(&comparison)?,
                fired_at: parse_ts(&fired_at)?,
            });
        }
        Ok(events)
    }
}
