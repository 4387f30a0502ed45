impl Reconciler {
    /// Phase 4: the remote copy wins for every row without unflushed local work.
    fn pull_all<R: RemoteGateway>(
        &self,
        conn: &Connection,
        remote: &R,
        purged: &BTreeSet<(RecordKind, String)>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        for kind in RecordKind::PUSH_ORDER {
            let payloads = match remote.list_all(kind) {
                Ok(payloads) => payloads,
                Err(e) => {
                    warn!(%kind, "pull failed: {e:#}");
                    outcome.pull_failures.push(PullFailure {
                        kind,
                        message: format!("{e:#}"),
                    });
                    continue;
                }
            };

            let mut written = 0u64;
            for payload in &payloads {
                if payload.id.trim().is_empty() {
                    warn!(%kind, "skipping remote payload without id");
                    continue;
                }
                if purged.contains(&(kind, payload.id.clone())) {
                    continue;
                }
                if db::overwrite_from_remote(conn, kind, payload)? {
                    written += 1;
                }
            }
            debug!(%kind, listed = payloads.len(), written, "pulled");
            outcome.pulled += written;
        }
        Ok(())
    }
}
