fn delete_remotely<R: RemoteGateway>(remote: &R, record: &Record) -> Result<()> {
    match remote.delete(record.kind, &record.id) {
        Ok(()) => Ok(()),
        Err(e) if e.is::<NotFound>() => {
            debug!(kind = %record.kind, id = %record.id, "remote already gone");
            Ok(())
        }
        Err(e) => Err(e.context(format!("delete {} {}", record.kind, record.id))),
    }
}

/// Drops the bytes of a purged record. The row is already gone, so failures only leave
/// orphans behind.
fn discard_assets<R: RemoteGateway>(migrator: &MediaMigrator<'_, R>, record: &Record) {
    for asset in &record.assets {
        if let Err(e) = migrator.discard(asset) {
            warn!(kind = %record.kind, id = %record.id, "failed to discard asset: {e:#}");
        }
    }
}

impl Reconciler {
    /// Phase 1. Returns the ids purged locally so the pull cannot bring them back.
    ///
    /// Assets are discarded only once the row is purged: a record re-saved while its delete
    /// was in flight keeps its files and objects.
    fn propagate_deletions<R: RemoteGateway>(
        &self,
        conn: &Connection,
        migrator: &MediaMigrator<'_, R>,
        remote: &R,
        tombstoned: Vec<Record>,
        outcome: &mut SyncOutcome,
    ) -> Result<BTreeSet<(RecordKind, String)>> {
        let mut purged = BTreeSet::new();
        for record in tombstoned {
            if let Err(e) = delete_remotely(remote, &record) {
                outcome.record_failure(&record, SyncPhase::Delete, &e);
                continue;
            }

            if db::purge(conn, record.kind, &record.id)? {
                discard_assets(migrator, &record);
                purged.insert((record.kind, record.id.clone()));
            } else {
                debug!(kind = %record.kind, id = %record.id, "re-created during pass; kept");
            }
            outcome.deleted += 1;
            self.progress.item_completed();
        }
        Ok(purged)
    }
}
