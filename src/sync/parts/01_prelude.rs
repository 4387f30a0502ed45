/// Environment facts a pass needs before it may touch anything. Passed in explicitly so
/// passes can run without a live network or session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub network_reachable: bool,
    pub credentials_valid: bool,
}

impl Capabilities {
    pub fn online() -> Self {
        Self {
            network_reachable: true,
            credentials_valid: true,
        }
    }

    pub fn offline() -> Self {
        Self {
            network_reachable: false,
            credentials_valid: true,
        }
    }

    fn check(self) -> std::result::Result<(), Unreachable> {
        if !self.network_reachable {
            return Err(Unreachable::Offline);
        }
        if !self.credentials_valid {
            return Err(Unreachable::Unauthenticated);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Delete,
    Push,
}

#[derive(Clone, Debug, Serialize)]
pub struct ItemFailure {
    pub kind: RecordKind,
    pub id: String,
    pub phase: SyncPhase,
    pub error: ItemErrorKind,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PullFailure {
    pub kind: RecordKind,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncOutcome {
    pub deleted: u64,
    pub pushed: u64,
    pub pulled: u64,
    pub failures: Vec<ItemFailure>,
    pub pull_failures: Vec<PullFailure>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.pull_failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    fn record_failure(&mut self, record: &Record, phase: SyncPhase, e: &anyhow::Error) {
        let error = classify_item_error(e);
        warn!(
            kind = %record.kind,
            id = %record.id,
            ?phase,
            ?error,
            "sync item failed: {e:#}"
        );
        self.failures.push(ItemFailure {
            kind: record.kind,
            id: record.id.clone(),
            phase,
            error,
            message: format!("{e:#}"),
        });
    }

    fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}/{}", f.kind, f.id))
            .collect();
        parts.extend(self.pull_failures.iter().map(|f| format!("pull {}", f.kind)));
        format!("{} sync item(s) failed: {}", parts.len(), parts.join(", "))
    }
}

fn sync_scope_id(remote: &impl RemoteGateway) -> String {
    B64_URL.encode(remote.target_id().as_bytes())
}

fn last_success_key(remote: &impl RemoteGateway) -> String {
    format!("sync.last_success_ms:{}", sync_scope_id(remote))
}

/// When the last fully successful pass against `remote` finished, if any.
pub fn last_success_ms(conn: &Connection, remote: &impl RemoteGateway) -> Result<Option<i64>> {
    db::get_setting_i64(conn, &last_success_key(remote))
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

/// Runs sync passes. At most one pass executes at a time per reconciler.
pub struct Reconciler {
    pass_guard: Mutex<()>,
    progress: ProgressBus,
    upload_parallelism: usize,
}

impl Reconciler {
    pub fn new(progress: ProgressBus, config: &SyncConfig) -> Self {
        Self {
            pass_guard: Mutex::new(()),
            progress,
            upload_parallelism: config.upload_parallelism.max(1),
        }
    }

    pub fn progress(&self) -> &ProgressBus {
        &self.progress
    }

    /// One pass: propagate deletions, push dirty records (migrating local assets), then pull.
    ///
    /// Per-record problems are collected in the outcome. Storage errors abort the pass.
    pub fn run_pass<R: RemoteGateway>(
        &self,
        conn: &Connection,
        blobs: &BlobStore,
        remote: &R,
        caps: Capabilities,
    ) -> std::result::Result<SyncOutcome, SyncError> {
        let _guard = match self.pass_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("sync pass requested while another is running");
                return Err(SyncError::PassInFlight);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if let Err(reason) = caps.check() {
            info!(%reason, "sync pass skipped");
            self.progress.error(reason.to_string());
            return Err(SyncError::Unreachable(reason));
        }

        let started = Instant::now();
        match self.run_phases(conn, blobs, remote) {
            Ok(outcome) => {
                info!(
                    deleted = outcome.deleted,
                    pushed = outcome.pushed,
                    pulled = outcome.pulled,
                    failed = outcome.failures.len() + outcome.pull_failures.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync pass finished"
                );
                if outcome.is_success() {
                    self.progress.finish();
                } else {
                    self.progress.error(outcome.summary());
                }
                Ok(outcome)
            }
            Err(e) => {
                error!("sync pass aborted: {e:#}");
                self.progress.error(format!("{e:#}"));
                Err(SyncError::StorageFault(e))
            }
        }
    }

    fn run_phases<R: RemoteGateway>(
        &self,
        conn: &Connection,
        blobs: &BlobStore,
        remote: &R,
    ) -> Result<SyncOutcome> {
        let mut tombstoned = Vec::new();
        for kind in RecordKind::PUSH_ORDER.into_iter().rev() {
            tombstoned.extend(db::list_tombstoned(conn, kind)?);
        }
        let mut dirty = Vec::new();
        let mut total = tombstoned.len();
        for kind in RecordKind::PUSH_ORDER {
            let records = db::list_dirty(conn, kind)?;
            total += records.len();
            dirty.push((kind, records));
        }

        info!(
            tombstoned = tombstoned.len(),
            dirty = total - tombstoned.len(),
            target = remote.target_id(),
            "sync pass started"
        );
        self.progress.start(total as u64);

        let migrator = MediaMigrator::new(blobs, remote, &self.progress);
        let mut outcome = SyncOutcome::default();

        let purged = self.propagate_deletions(conn, &migrator, remote, tombstoned, &mut outcome)?;
        for (kind, records) in dirty {
            self.push_kind(conn, &migrator, remote, kind, records, &mut outcome)?;
        }
        self.pull_all(conn, remote, &purged, &mut outcome)?;

        if outcome.is_success() {
            db::set_setting_i64(conn, &last_success_key(remote), now_ms())?;
        }
        Ok(outcome)
    }
}
