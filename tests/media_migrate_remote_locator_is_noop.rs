use std::sync::{Arc, Mutex};

use keepsake_sync::blob::BlobStore;
use keepsake_sync::db::{self, RecordDraft, RecordKind};
use keepsake_sync::media::MediaMigrator;
use keepsake_sync::progress::{ProgressBus, UploadEvent};
use keepsake_sync::remote::InMemoryRemoteGateway;

#[test]
fn migrating_an_already_remote_locator_makes_no_calls() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    let conn = db::open(&app_dir).expect("open db");
    let blobs = BlobStore::open(&app_dir).expect("open blobs");
    let remote = InMemoryRemoteGateway::new();
    let progress = ProgressBus::default();
    let migrator = MediaMigrator::new(&blobs, &remote, &progress);

    let photo = blobs.import(b"bytes", "webp").expect("import");
    let record = db::upsert_local(
        &conn,
        &RecordDraft::new(RecordKind::Profile, serde_json::json!({"name": "Ada"}))
            .with_id("P1")
            .with_asset(photo.clone()),
    )
    .expect("create profile");

    let rewrite = migrator
        .migrate(&record, &photo)
        .expect("first migrate")
        .expect("local locator migrates");
    assert_eq!(rewrite.local, photo);
    let url = rewrite.remote.remote_url().expect("remote").to_string();
    assert!(url.contains("/P1/avatars/"), "got {url}");
    assert_eq!(remote.call_count(), 1);

    // Upload alone never deletes the local file.
    let file = photo.local_file().expect("local");
    assert!(blobs.contains(file));

    let again = migrator
        .migrate(&record, &rewrite.remote)
        .expect("second migrate");
    assert!(again.is_none());
    assert_eq!(remote.call_count(), 1);

    migrator.commit(&rewrite);
    assert!(!blobs.contains(file));
}

#[test]
fn missing_local_file_is_an_asset_io_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    let conn = db::open(&app_dir).expect("open db");
    let blobs = BlobStore::open(&app_dir).expect("open blobs");
    let remote = InMemoryRemoteGateway::new();
    let progress = ProgressBus::default();
    let events = Arc::new(Mutex::new(Vec::<UploadEvent>::new()));
    let seen = Arc::clone(&events);
    progress.subscribe_uploads(move |e| seen.lock().expect("lock").push(e.clone()));
    let migrator = MediaMigrator::new(&blobs, &remote, &progress);

    let missing = keepsake_sync::db::AssetLocator::local("gone.jpg");
    let record = db::upsert_local(
        &conn,
        &RecordDraft::new(RecordKind::Memory, serde_json::json!({}))
            .with_id("M9")
            .with_asset(missing.clone()),
    )
    .expect("create memory");

    let err = migrator.migrate(&record, &missing).expect_err("missing file");
    assert_eq!(
        keepsake_sync::error::classify_item_error(&err),
        keepsake_sync::error::ItemErrorKind::AssetIo
    );
    assert_eq!(remote.call_count(), 0);

    let events = events.lock().expect("lock");
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], UploadEvent::Failed { file_name, .. } if file_name == "gone.jpg"));
}
