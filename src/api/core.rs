use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::blob::BlobStore;
use crate::config::{self, SyncConfig};
use crate::db::{self, AssetLocator, Record, RecordDraft, RecordKind};
use crate::error::SyncError;
use crate::progress::{ProgressBus, SyncProgress, UploadEvent};
use crate::remote::RemoteGateway;
use crate::sync::{self, Capabilities, Reconciler, SyncOutcome};

/// Local-first store bound to one remote target.
///
/// Every call opens its own connection, so presentation reads and writes can proceed while a
/// pass is running on another thread.
pub struct SyncEngine<R: RemoteGateway> {
    app_dir: PathBuf,
    blobs: BlobStore,
    remote: R,
    config: SyncConfig,
    reconciler: Reconciler,
}

impl<R: RemoteGateway> SyncEngine<R> {
    pub fn open(app_dir: &Path, remote: R) -> Result<Self> {
        let conn = db::open(app_dir)?;
        let config = config::load_sync_config(&conn)?;
        let blobs = BlobStore::open(app_dir)?;
        let progress = ProgressBus::new(config.status_display_interval);
        let reconciler = Reconciler::new(progress, &config);
        info!(app_dir = %app_dir.display(), target = remote.target_id(), "sync engine opened");

        Ok(Self {
            app_dir: app_dir.to_path_buf(),
            blobs,
            remote,
            config,
            reconciler,
        })
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Settings loaded at open. Build an HTTP gateway with
    /// `HttpRemoteGateway::from_config` so it honours `request_timeout`.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn connection(&self) -> Result<Connection> {
        db::open(&self.app_dir)
    }

    /// Stores asset bytes locally and returns the locator to attach to a record.
    pub fn import_asset(&self, bytes: &[u8], extension: &str) -> Result<AssetLocator> {
        self.blobs.import(bytes, extension)
    }

    pub fn create_or_update(&self, draft: &RecordDraft) -> Result<Record> {
        let conn = self.connection()?;
        db::upsert_local(&conn, draft)
    }

    /// Soft delete. Returns false if there was no live record with that id.
    pub fn delete(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let conn = self.connection()?;
        db::mark_tombstoned(&conn, kind, id)
    }

    pub fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        let conn = self.connection()?;
        db::get_record(&conn, kind, id)
    }

    pub fn list(&self, kind: RecordKind) -> Result<Vec<Record>> {
        let conn = self.connection()?;
        db::list_records(&conn, kind)
    }

    pub fn list_by_owner(&self, kind: RecordKind, owner_id: &str) -> Result<Vec<Record>> {
        let conn = self.connection()?;
        db::list_records_by_owner(&conn, kind, owner_id)
    }

    /// Runs one pass on the calling thread.
    pub fn run_sync_pass(&self, caps: Capabilities) -> std::result::Result<SyncOutcome, SyncError> {
        let conn = self.connection().map_err(SyncError::StorageFault)?;
        self.reconciler
            .run_pass(&conn, &self.blobs, &self.remote, caps)
    }

    pub fn subscribe_progress(&self, callback: impl Fn(&SyncProgress) + Send + Sync + 'static) {
        self.reconciler.progress().subscribe(callback);
    }

    pub fn subscribe_uploads(&self, callback: impl Fn(&UploadEvent) + Send + Sync + 'static) {
        self.reconciler.progress().subscribe_uploads(callback);
    }

    pub fn unsubscribe_all(&self) {
        self.reconciler.progress().unsubscribe_all();
    }

    pub fn progress_snapshot(&self) -> SyncProgress {
        self.reconciler.progress().snapshot()
    }

    pub fn last_success_ms(&self) -> Result<Option<i64>> {
        let conn = self.connection()?;
        sync::last_success_ms(&conn, &self.remote)
    }
}

impl<R: RemoteGateway + 'static> SyncEngine<R> {
    /// Runs one pass on a background thread. A pass already in flight makes the returned
    /// handle resolve to `SyncError::PassInFlight`.
    pub fn spawn_sync_pass(
        self: &Arc<Self>,
        caps: Capabilities,
    ) -> JoinHandle<std::result::Result<SyncOutcome, SyncError>> {
        let engine = Arc::clone(self);
        thread::spawn(move || engine.run_sync_pass(caps))
    }
}
