use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use keepsake_sync::api::SyncEngine;
use keepsake_sync::db::{RecordDraft, RecordKind};
use keepsake_sync::error::ItemErrorKind;
use keepsake_sync::remote::{InMemoryRemoteGateway, RemoteGateway, RemotePayload};
use keepsake_sync::sync::Capabilities;

/// Times out the first `failures` upserts.
struct FlakyUpsertRemote {
    inner: InMemoryRemoteGateway,
    failures: AtomicUsize,
}

impl RemoteGateway for FlakyUpsertRemote {
    fn target_id(&self) -> &str {
        self.inner.target_id()
    }

    fn upsert(&self, kind: RecordKind, payload: &RemotePayload) -> Result<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("operation timed out"));
        }
        self.inner.upsert(kind, payload)
    }

    fn delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        self.inner.delete(kind, id)
    }

    fn list_all(&self, kind: RecordKind) -> Result<Vec<RemotePayload>> {
        self.inner.list_all(kind)
    }

    fn put_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.inner.put_object(path, bytes, content_type)
    }

    fn delete_object(&self, path: &str) -> Result<()> {
        self.inner.delete_object(path)
    }

    fn object_path_from_url(&self, url: &str) -> Option<String> {
        self.inner.object_path_from_url(url)
    }
}

#[test]
fn uploaded_assets_are_not_uploaded_again_after_upsert_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    let remote = FlakyUpsertRemote {
        inner: InMemoryRemoteGateway::new(),
        failures: AtomicUsize::new(1),
    };
    let engine = SyncEngine::open(&app_dir, remote).expect("open engine");

    let first = engine.import_asset(b"one", "jpg").expect("import");
    let second = engine.import_asset(b"two", "png").expect("import");
    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Story, serde_json::json!({"title": "bedtime"}))
                .with_id("S1")
                .with_owner("P1")
                .with_asset(first.clone())
                .with_asset(second.clone()),
        )
        .expect("create S1");

    let outcome = engine
        .run_sync_pass(Capabilities::online())
        .expect("first pass");
    assert_eq!(outcome.failed_ids(), vec!["S1"]);
    assert_eq!(outcome.failures[0].error, ItemErrorKind::Transport);
    assert_eq!(engine.remote().inner.object_put_count(), 2);

    let pending = engine
        .get(RecordKind::Story, "S1")
        .expect("get S1")
        .expect("S1 exists");
    assert!(pending.dirty);
    assert!(pending.assets.iter().all(|a| a.remote_url().is_some()));
    for asset in [&first, &second] {
        assert!(!engine.blobs().contains(asset.local_file().expect("local")));
    }
    assert!(engine.remote().inner.record(RecordKind::Story, "S1").is_none());

    let outcome = engine
        .run_sync_pass(Capabilities::online())
        .expect("second pass");
    assert!(outcome.is_success());
    assert_eq!(engine.remote().inner.object_put_count(), 2);

    let synced = engine
        .get(RecordKind::Story, "S1")
        .expect("get S1")
        .expect("S1 exists");
    assert!(!synced.dirty);
    assert_eq!(synced.assets, pending.assets);
    let payload = engine
        .remote()
        .inner
        .record(RecordKind::Story, "S1")
        .expect("remote S1");
    assert_eq!(payload.assets.len(), 2);
}
