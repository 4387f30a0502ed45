use std::fs;

use keepsake_sync::api::SyncEngine;
use keepsake_sync::db::{RecordDraft, RecordKind};
use keepsake_sync::error::ItemErrorKind;
use keepsake_sync::remote::{InMemoryRemoteGateway, RemoteGateway, RemotePayload};
use keepsake_sync::sync::{Capabilities, SyncPhase};

#[test]
fn unreadable_asset_keeps_record_dirty_and_local() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    let engine = SyncEngine::open(&app_dir, InMemoryRemoteGateway::new()).expect("open engine");

    let photo = engine.import_asset(b"jpeg", "jpg").expect("import");
    let file = photo.local_file().expect("local").to_string();
    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Memory, serde_json::json!({"title": "local edit"}))
                .with_id("M1")
                .with_owner("P1")
                .with_asset(photo.clone()),
        )
        .expect("create M1");

    // Another device already published an older copy.
    engine
        .remote()
        .upsert(
            RecordKind::Memory,
            &RemotePayload {
                id: "M1".to_string(),
                owner_id: Some("P1".to_string()),
                fields: serde_json::json!({"title": "remote copy"}),
                assets: Vec::new(),
                updated_at_ms: 1,
            },
        )
        .expect("seed remote");

    fs::remove_file(engine.blobs().root().join(&file)).expect("lose file");
    let puts_before = engine.remote().object_put_count();

    let outcome = engine
        .run_sync_pass(Capabilities::online())
        .expect("pass runs despite item failure");
    assert_eq!(outcome.failed_ids(), vec!["M1"]);
    assert_eq!(outcome.failures[0].phase, SyncPhase::Push);
    assert_eq!(outcome.failures[0].error, ItemErrorKind::AssetIo);
    assert_eq!(engine.remote().object_put_count(), puts_before);

    let m1 = engine
        .get(RecordKind::Memory, "M1")
        .expect("get M1")
        .expect("M1 exists");
    assert!(m1.dirty);
    assert_eq!(m1.assets, vec![photo]);
    assert_eq!(m1.fields["title"], "local edit");
}
