use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use keepsake_sync::api::SyncEngine;
use keepsake_sync::config::{self, SyncConfig};
use keepsake_sync::db::{self, RecordDraft, RecordKind};
use keepsake_sync::progress::{SyncProgress, SyncStatus};
use keepsake_sync::remote::InMemoryRemoteGateway;
use keepsake_sync::sync::Capabilities;

#[test]
fn progress_counts_items_then_returns_to_idle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    {
        let conn = db::open(&app_dir).expect("open db");
        let config = SyncConfig {
            status_display_interval: Duration::from_millis(50),
            ..SyncConfig::default()
        };
        config::save_sync_config(&conn, &config).expect("save config");
    }
    let engine = SyncEngine::open(&app_dir, InMemoryRemoteGateway::new()).expect("open engine");
    assert_eq!(
        engine.config().status_display_interval,
        Duration::from_millis(50)
    );

    let events = Arc::new(Mutex::new(Vec::<SyncProgress>::new()));
    let seen = Arc::clone(&events);
    engine.subscribe_progress(move |p| seen.lock().expect("lock").push(p.clone()));

    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Profile, serde_json::json!({"name": "Ada"}))
                .with_id("P1"),
        )
        .expect("create profile");
    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Memory, serde_json::json!({"title": "hi"}))
                .with_id("M1")
                .with_owner("P1"),
        )
        .expect("create memory");

    engine
        .run_sync_pass(Capabilities::online())
        .expect("sync pass");

    let snapshot = engine.progress_snapshot();
    assert!(
        matches!(snapshot.status, SyncStatus::Success | SyncStatus::Idle),
        "got {snapshot:?}"
    );

    thread::sleep(Duration::from_millis(500));
    assert_eq!(engine.progress_snapshot().status, SyncStatus::Idle);

    let events = events.lock().expect("lock");
    let statuses: Vec<SyncStatus> = events.iter().map(|p| p.status).collect();
    assert_eq!(statuses.first(), Some(&SyncStatus::Syncing));
    assert_eq!(events[0].total, 2);
    assert_eq!(events[0].completed, 0);
    let success = events
        .iter()
        .find(|p| p.status == SyncStatus::Success)
        .expect("success event");
    assert_eq!(success.completed, 2);
    assert_eq!(statuses.last(), Some(&SyncStatus::Idle));
}
