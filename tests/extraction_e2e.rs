//! End-to-end pipeline scenarios against a mock HTTP server and a temp
//! database file.

use vigil_runtime::config::Config;
use vigil_runtime::events::EventBus;
use vigil_runtime::extract::pipeline::{process_item, run_batch};
use vigil_runtime::extract::static_tier::StaticExtractor;
use vigil_runtime::model::{Comparison, SnapshotStatus, TrackedItem, Trigger, ValueKind};
use vigil_runtime::renderer::RendererHandle;
use vigil_runtime::repair::{RepairProposal, RepairProposer, RepairRequest};
use vigil_runtime::store::{SqliteStore, Store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        http_timeout_ms: 5_000,
        failure_threshold: 3,
        repair_url: None,
        repair_timeout_ms: 1_000,
    }
}

async fn serve_price(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_static_price_scenario() {
    // Item with selector ".price", page serves "$19.99" → ok snapshot with
    // the exact numeric value; success needs no health mutation.
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(dir.path()).db_path()).unwrap();
    let server = serve_price(
        r#"<html><body><div class="card"><span class="price">$19.99</span></div></body></html>"#,
    )
    .await;

    let item = TrackedItem::new(format!("{}/product", server.uri()), ".price", ValueKind::Price);
    store.create_item(&item).unwrap();

    let statics = StaticExtractor::new(5_000);
    let renderer = RendererHandle::disabled();
    let bus = EventBus::new(16);

    let report = process_item(&store, &statics, &renderer, &item, 3, &bus)
        .await
        .unwrap();

    assert_eq!(report.snapshot.status, SnapshotStatus::Ok);
    assert_eq!(report.snapshot.value_raw, "$19.99");
    assert_eq!(report.snapshot.value_numeric, Some(19.99));

    let snapshots = store.snapshots(item.id, 10).unwrap();
    assert_eq!(snapshots.len(), 1, "exactly one snapshot per invocation");

    let loaded = store.item(item.id).unwrap().unwrap();
    assert_eq!(loaded.consecutive_failures, 0);
}

#[tokio::test]
async fn test_trigger_fires_once_across_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(dir.path()).db_path()).unwrap();
    let statics = StaticExtractor::new(5_000);
    let renderer = RendererHandle::disabled();
    let bus = EventBus::new(16);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<span class="price">$90.00</span>"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<span class="price">$80.00</span>"#),
        )
        .mount(&server)
        .await;

    let item = TrackedItem::new(server.uri(), ".price", ValueKind::Price);
    store.create_item(&item).unwrap();
    let trigger = Trigger::new(item.id, Comparison::Lt, 100.0);
    store.create_trigger(&trigger).unwrap();

    // First reading: 90 < 100 → exactly one event, latch set.
    let first = process_item(&store, &statics, &renderer, &item, 3, &bus)
        .await
        .unwrap();
    assert_eq!(first.snapshot.value_numeric, Some(90.0));
    assert_eq!(first.fired.len(), 1);
    assert_eq!(first.fired[0].snapshot_id, first.snapshot.id);

    // Second reading: 80 < 100 too, but the trigger already fired.
    let second = process_item(&store, &statics, &renderer, &item, 3, &bus)
        .await
        .unwrap();
    assert_eq!(second.snapshot.value_numeric, Some(80.0));
    assert!(second.fired.is_empty());

    assert_eq!(store.trigger_events(trigger.id).unwrap().len(), 1);
    let fired_trigger = store.armed_triggers(item.id).unwrap();
    assert!(fired_trigger.is_empty(), "latched trigger is dormant");
}

#[tokio::test]
async fn test_missing_vs_error_classification() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(dir.path()).db_path()).unwrap();
    let statics = StaticExtractor::new(5_000);
    let renderer = RendererHandle::disabled();
    let bus = EventBus::new(16);

    // Reachable page without the element → missing.
    let gone = serve_price("<html><body><p>moved</p></body></html>").await;
    let missing_item =
        TrackedItem::new(format!("{}/product", gone.uri()), ".price", ValueKind::Price);
    store.create_item(&missing_item).unwrap();

    // Persistent 500 → error after the retry budget.
    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&down)
        .await;
    let error_item = TrackedItem::new(down.uri(), ".price", ValueKind::Price);
    store.create_item(&error_item).unwrap();

    let r1 = process_item(&store, &statics, &renderer, &missing_item, 3, &bus)
        .await
        .unwrap();
    assert_eq!(r1.snapshot.status, SnapshotStatus::Missing);

    let r2 = process_item(&store, &statics, &renderer, &error_item, 3, &bus)
        .await
        .unwrap();
    assert_eq!(r2.snapshot.status, SnapshotStatus::Error);

    // Both failure classes move the health counter.
    for item in [&missing_item, &error_item] {
        let loaded = store.item(item.id).unwrap().unwrap();
        assert_eq!(loaded.consecutive_failures, 1);
        assert!(loaded.last_failure_at.is_some());
    }
}

/// Collaborator stub that always proposes the same replacement selector.
struct FixedProposer;

#[async_trait::async_trait]
impl RepairProposer for FixedProposer {
    async fn propose(&self, request: &RepairRequest) -> anyhow::Result<Option<RepairProposal>> {
        assert_eq!(request.current_selector, ".price");
        Ok(Some(RepairProposal {
            selector: ".price-v2".into(),
            sample_text: "$42.00".into(),
            kind: None,
            numeric: None,
        }))
    }
}

#[tokio::test]
async fn test_sustained_failure_triggers_repair_in_batch() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());
    let store = SqliteStore::open(&config.db_path()).unwrap();
    let statics = StaticExtractor::new(5_000);
    let renderer = RendererHandle::disabled();
    let bus = EventBus::new(16);

    let server = serve_price("<html><body><p>redesigned</p></body></html>").await;
    let item = TrackedItem::new(format!("{}/product", server.uri()), ".price", ValueKind::Price);
    store.create_item(&item).unwrap();

    // Two failures: under the threshold, no repair yet.
    for _ in 0..2 {
        let summary = run_batch(&store, &statics, &renderer, Some(&FixedProposer), &config, &bus)
            .await
            .unwrap();
        assert_eq!(summary.repairs_attempted, 0);
    }

    // Third failure crosses the threshold and the proposal is installed.
    let summary = run_batch(&store, &statics, &renderer, Some(&FixedProposer), &config, &bus)
        .await
        .unwrap();
    assert_eq!(summary.repairs_attempted, 1);
    assert_eq!(summary.repairs_applied, 1);

    let repaired = store.item(item.id).unwrap().unwrap();
    assert_eq!(repaired.selector, ".price-v2");
    assert_eq!(repaired.consecutive_failures, 0);
    assert_eq!(repaired.sample_text.as_deref(), Some("$42.00"));

    let latest = store.latest_ok_snapshot(item.id).unwrap().unwrap();
    assert_eq!(latest.value_raw, "$42.00");
    assert_eq!(latest.value_numeric, Some(42.0));

    // 3 failure snapshots from the runs + 1 ok snapshot from the repair.
    assert_eq!(store.snapshots(item.id, 10).unwrap().len(), 4);

    // The page lacks the new selector too, so the counter starts climbing
    // again from zero.
    let summary = run_batch(&store, &statics, &renderer, Some(&FixedProposer), &config, &bus)
        .await
        .unwrap();
    assert_eq!(summary.missing, 1);
    assert_eq!(
        store.item(item.id).unwrap().unwrap().consecutive_failures,
        1
    );
}
