/// A local locator that now has a remote copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRewrite {
    pub local: AssetLocator,
    pub remote: AssetLocator,
}

/// Replaces every locator matching a rewrite's `local` side. Returns how many were replaced.
pub fn apply_asset_rewrites(assets: &mut [AssetLocator], rewrites: &[AssetRewrite]) -> usize {
    let mut replaced = 0;
    for asset in assets.iter_mut() {
        if let Some(rewrite) = rewrites.iter().find(|rw| rw.local == *asset) {
            *asset = rewrite.remote.clone();
            replaced += 1;
        }
    }
    replaced
}

fn rewrite_assets_and_maybe_clear_dirty(
    conn: &Connection,
    kind: RecordKind,
    id: &str,
    rewrites: &[AssetRewrite],
    synced_rev: Option<i64>,
) -> Result<bool> {
    let table = kind.table();
    with_immediate_transaction(conn, || {
        let current: Option<(String, i64, i64)> = conn
            .query_row(
                &format!("SELECT assets, rev, tombstoned FROM {table} WHERE id = ?1"),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((assets_json, rev, tombstoned)) = current else {
            return Ok(false);
        };

        let mut assets: Vec<AssetLocator> = serde_json::from_str(&assets_json)
            .map_err(|e| anyhow!("corrupt assets for {kind} {id}: {e}"))?;
        apply_asset_rewrites(&mut assets, rewrites);

        // A newer local edit (or a delete) keeps the row dirty for the next pass.
        let clear_dirty = tombstoned == 0 && synced_rev == Some(rev);
        conn.execute(
            &format!(
                r#"UPDATE {table}
                   SET assets = ?2,
                       dirty = CASE WHEN ?3 THEN 0 ELSE dirty END
                   WHERE id = ?1"#
            ),
            params![id, encode_assets(&assets)?, clear_dirty],
        )?;
        Ok(clear_dirty)
    })
}

/// Persists the migrated locators of an acknowledged upsert and clears `dirty`, unless the
/// row changed locally after revision `synced_rev` was read. Returns whether `dirty` cleared.
pub fn mark_synced(
    conn: &Connection,
    kind: RecordKind,
    id: &str,
    synced_rev: i64,
    rewrites: &[AssetRewrite],
) -> Result<bool> {
    rewrite_assets_and_maybe_clear_dirty(conn, kind, id, rewrites, Some(synced_rev))
}

/// Persists locators that were uploaded even though the record's upsert failed, so the next
/// pass does not upload them again. The row stays dirty.
pub fn record_migrated_assets(
    conn: &Connection,
    kind: RecordKind,
    id: &str,
    rewrites: &[AssetRewrite],
) -> Result<()> {
    if rewrites.is_empty() {
        return Ok(());
    }
    rewrite_assets_and_maybe_clear_dirty(conn, kind, id, rewrites, None)?;
    Ok(())
}

/// Hard-deletes a tombstoned row after the remote acknowledged the delete. A row that was
/// re-created in the meantime is left alone.
pub fn purge(conn: &Connection, kind: RecordKind, id: &str) -> Result<bool> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1 AND tombstoned = 1", kind.table()),
        params![id],
    )?;
    Ok(removed > 0)
}

/// Replace-or-insert from the remote copy. Rows with unflushed local work (dirty or
/// tombstoned) are never touched. Returns whether the row was written.
pub fn overwrite_from_remote(
    conn: &Connection,
    kind: RecordKind,
    payload: &crate::remote::RemotePayload,
) -> Result<bool> {
    if payload.id.trim().is_empty() {
        return Err(anyhow!("remote {kind} payload has an empty id"));
    }
    let table = kind.table();
    let assets: Vec<AssetLocator> = payload
        .assets
        .iter()
        .map(|url| AssetLocator::remote(url.as_str()))
        .collect();
    let fields = serde_json::to_string(&payload.fields)?;

    let written = conn.execute(
        &format!(
            r#"
INSERT INTO {table}(id, owner_id, fields, assets, dirty, tombstoned, rev, updated_at)
VALUES (?1, ?2, ?3, ?4, 0, 0, 1, ?5)
ON CONFLICT(id) DO UPDATE SET
  owner_id = excluded.owner_id,
  fields = excluded.fields,
  assets = excluded.assets,
  dirty = 0,
  updated_at = excluded.updated_at
WHERE {table}.dirty = 0 AND {table}.tombstoned = 0
"#
        ),
        params![
            payload.id,
            payload.owner_id,
            fields,
            encode_assets(&assets)?,
            payload.updated_at_ms
        ],
    )?;
    Ok(written > 0)
}
