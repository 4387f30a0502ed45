fn db_path(app_dir: &Path) -> PathBuf {
    app_dir.join("keepsake.sqlite3")
}

fn migrate(conn: &Connection) -> Result<()> {
    let mut user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if user_version < 1 {
        let mut ddl = String::from(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
        );
        for kind in RecordKind::PUSH_ORDER {
            let table = kind.table();
            ddl.push_str(&format!(
                r#"
CREATE TABLE IF NOT EXISTS {table} (
  id TEXT PRIMARY KEY,
  owner_id TEXT,
  fields TEXT NOT NULL,
  assets TEXT NOT NULL DEFAULT '[]',
  dirty INTEGER NOT NULL DEFAULT 1,
  tombstoned INTEGER NOT NULL DEFAULT 0,
  rev INTEGER NOT NULL DEFAULT 1,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_sync_flags
  ON {table}(dirty, tombstoned);
"#
            ));
        }

        conn.execute_batch(&ddl)?;
        conn.execute_batch("PRAGMA user_version = 1;")?;
        user_version = 1;
    }

    if user_version < 2 {
        // v2: owner lookups for per-profile listings.
        for kind in RecordKind::PUSH_ORDER {
            let table = kind.table();
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}(owner_id);"
            ))?;
        }
        conn.execute_batch("PRAGMA user_version = 2;")?;
    }

    Ok(())
}

pub fn open(app_dir: &Path) -> Result<Connection> {
    fs::create_dir_all(app_dir)?;
    let conn = Connection::open(db_path(app_dir))?;
    conn.busy_timeout(Duration::from_millis(5_000))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    migrate(&conn)?;
    crate::config::ensure_sync_config_defaults(&conn)?;
    Ok(conn)
}

fn with_immediate_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;
    match f() {
        Ok(v) => {
            conn.execute_batch("COMMIT;")?;
            Ok(v)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}
