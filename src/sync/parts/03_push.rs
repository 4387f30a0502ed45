struct PushResult {
    record: Record,
    rewrites: Vec<AssetRewrite>,
    result: Result<()>,
}

/// Uploads the record's local assets and upserts the rewritten payload. Runs on a worker
/// thread and never touches the local store.
fn push_record<R: RemoteGateway>(
    migrator: &MediaMigrator<'_, R>,
    remote: &R,
    record: &Record,
) -> (Vec<AssetRewrite>, Result<()>) {
    let mut rewrites: Vec<AssetRewrite> = Vec::new();
    for asset in &record.assets {
        if rewrites.iter().any(|rw| rw.local == *asset) {
            continue;
        }
        match migrator.migrate(record, asset) {
            Ok(Some(rewrite)) => rewrites.push(rewrite),
            Ok(None) => {}
            Err(e) => return (rewrites, Err(e)),
        }
    }

    let mut final_record = record.clone();
    db::apply_asset_rewrites(&mut final_record.assets, &rewrites);
    let result = RemotePayload::from_record(&final_record).and_then(|payload| {
        remote
            .upsert(record.kind, &payload)
            .with_context(|| format!("upsert {} {}", record.kind, record.id))
    });
    (rewrites, result)
}

impl Reconciler {
    /// Phase 2 for one kind. Network work is spread over worker threads; every local store
    /// write for a record happens here, on the pass thread, as its result arrives.
    fn push_kind<R: RemoteGateway>(
        &self,
        conn: &Connection,
        migrator: &MediaMigrator<'_, R>,
        remote: &R,
        kind: RecordKind,
        records: Vec<Record>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let concurrency = self.upload_parallelism.min(records.len());
        let mut buckets: Vec<Vec<Record>> = vec![Vec::new(); concurrency];
        for (i, record) in records.into_iter().enumerate() {
            buckets[i % concurrency].push(record);
        }
        debug!(%kind, concurrency, "pushing dirty records");

        thread::scope(|scope| -> Result<()> {
            let (tx, rx) = mpsc::channel::<PushResult>();
            for bucket in buckets {
                let tx = tx.clone();
                scope.spawn(move || {
                    for record in bucket {
                        let (rewrites, result) = push_record(migrator, remote, &record);
                        let sent = tx.send(PushResult {
                            record,
                            rewrites,
                            result,
                        });
                        if sent.is_err() {
                            // The pass aborted; leave the rest for the next one.
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for pushed in rx {
                self.settle_push(conn, migrator, pushed, outcome)?;
            }
            Ok(())
        })
    }

    fn settle_push<R: RemoteGateway>(
        &self,
        conn: &Connection,
        migrator: &MediaMigrator<'_, R>,
        pushed: PushResult,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let PushResult {
            record,
            rewrites,
            result,
        } = pushed;

        match result {
            Ok(()) => {
                let cleared = db::mark_synced(conn, record.kind, &record.id, record.rev, &rewrites)?;
                if !cleared {
                    debug!(kind = %record.kind, id = %record.id, "changed during push; stays dirty");
                }
                outcome.pushed += 1;
                self.progress.item_completed();
            }
            Err(e) => {
                // Keep what was uploaded so the next pass does not upload it again.
                db::record_migrated_assets(conn, record.kind, &record.id, &rewrites)?;
                outcome.record_failure(&record, SyncPhase::Push, &e);
            }
        }

        for rewrite in &rewrites {
            migrator.commit(rewrite);
        }
        Ok(())
    }
}
