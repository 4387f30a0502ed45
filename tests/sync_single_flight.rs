use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use keepsake_sync::api::SyncEngine;
use keepsake_sync::db::{RecordDraft, RecordKind};
use keepsake_sync::error::SyncError;
use keepsake_sync::remote::{InMemoryRemoteGateway, RemoteGateway, RemotePayload};
use keepsake_sync::sync::Capabilities;

/// Parks every upsert until the test releases it.
struct GatedRemote {
    inner: InMemoryRemoteGateway,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl RemoteGateway for GatedRemote {
    fn target_id(&self) -> &str {
        self.inner.target_id()
    }

    fn upsert(&self, kind: RecordKind, payload: &RemotePayload) -> Result<()> {
        self.entered
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .send(())
            .map_err(|_| anyhow!("test gone"))?;
        self.release
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| anyhow!("never released"))?;
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
fn second_pass_is_refused_while_one_is_running() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("keepsake");
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let remote = GatedRemote {
        inner: InMemoryRemoteGateway::new(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let engine = Arc::new(SyncEngine::open(&app_dir, remote).expect("open engine"));

    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Setting, serde_json::json!({"theme": "dark"}))
                .with_id("theme"),
        )
        .expect("create setting");

    let running = engine.spawn_sync_pass(Capabilities::online());
    entered_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("first pass reached the remote");

    // Presentation writes keep working during the pass.
    engine
        .create_or_update(
            &RecordDraft::new(RecordKind::Setting, serde_json::json!({"theme": "light"}))
                .with_id("theme"),
        )
        .expect("edit during pass");

    let err = engine
        .run_sync_pass(Capabilities::online())
        .expect_err("concurrent pass");
    assert!(matches!(err, SyncError::PassInFlight));

    release_tx.send(()).expect("release");
    let outcome = running
        .join()
        .expect("pass thread")
        .expect("first pass succeeds");
    assert!(outcome.is_success());

    // The edit made mid-pass was not acknowledged, so it stays dirty for the next pass.
    let theme = engine
        .get(RecordKind::Setting, "theme")
        .expect("get")
        .expect("setting exists");
    assert!(theme.dirty);
    assert_eq!(theme.fields["theme"], "light");
}
