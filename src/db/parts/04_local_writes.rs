/// Creates or replaces a record on behalf of feature code. The row becomes dirty and
/// un-tombstoned; writing the same id again is idempotent apart from the revision bump.
pub fn upsert_local(conn: &Connection, draft: &RecordDraft) -> Result<Record> {
    let id = match draft.id.as_deref().map(str::trim) {
        Some("") => return Err(anyhow!("record id must not be empty")),
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    if !draft.fields.is_object() {
        return Err(anyhow!("record fields must be a JSON object"));
    }

    let table = draft.kind.table();
    let fields = serde_json::to_string(&draft.fields)?;
    let assets = encode_assets(&draft.assets)?;
    conn.execute(
        &format!(
            r#"
INSERT INTO {table}(id, owner_id, fields, assets, dirty, tombstoned, rev, updated_at)
VALUES (?1, ?2, ?3, ?4, 1, 0, 1, ?5)
ON CONFLICT(id) DO UPDATE SET
  owner_id = excluded.owner_id,
  fields = excluded.fields,
  assets = excluded.assets,
  dirty = 1,
  tombstoned = 0,
  rev = {table}.rev + 1,
  updated_at = excluded.updated_at
"#
        ),
        params![id, draft.owner_id, fields, assets, now_ms()],
    )?;

    get_record_any(conn, draft.kind, &id)?
        .ok_or_else(|| anyhow!("{} {id} vanished after upsert", draft.kind))
}

/// Soft-deletes a live record. Fields and locators are kept so the sync pass can clean up
/// assets. Returns false if there is no live record with that id.
pub fn mark_tombstoned(conn: &Connection, kind: RecordKind, id: &str) -> Result<bool> {
    let table = kind.table();
    let changed = conn.execute(
        &format!(
            r#"UPDATE {table}
               SET tombstoned = 1, dirty = 1, rev = rev + 1, updated_at = ?2
               WHERE id = ?1 AND tombstoned = 0"#
        ),
        params![id, now_ms()],
    )?;
    Ok(changed > 0)
}

/// Records visible to the presentation layer.
pub fn list_records(conn: &Connection, kind: RecordKind) -> Result<Vec<Record>> {
    query_records(conn, kind, "tombstoned = 0", &[])
}

pub fn list_records_by_owner(
    conn: &Connection,
    kind: RecordKind,
    owner_id: &str,
) -> Result<Vec<Record>> {
    query_records(conn, kind, "tombstoned = 0 AND owner_id = ?1", &[&owner_id])
}

pub fn get_record(conn: &Connection, kind: RecordKind, id: &str) -> Result<Option<Record>> {
    Ok(get_record_any(conn, kind, id)?.filter(|record| !record.tombstoned))
}

/// Like `get_record`, but also returns tombstoned rows.
pub fn get_record_any(conn: &Connection, kind: RecordKind, id: &str) -> Result<Option<Record>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE id = ?1",
        kind.table()
    );
    let raw = conn
        .query_row(&sql, params![id], RawRecordRow::from_row)
        .optional()?;
    raw.map(|raw| raw.into_record(kind)).transpose()
}

/// Rows with local changes to push: dirty and not tombstoned.
pub fn list_dirty(conn: &Connection, kind: RecordKind) -> Result<Vec<Record>> {
    query_records(conn, kind, "dirty = 1 AND tombstoned = 0", &[])
}

/// Rows whose deletion still has to reach the remote.
pub fn list_tombstoned(conn: &Connection, kind: RecordKind) -> Result<Vec<Record>> {
    query_records(conn, kind, "tombstoned = 1", &[])
}
