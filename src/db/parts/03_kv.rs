pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        r#"SELECT value FROM kv WHERE key = ?1"#,
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"INSERT INTO kv(key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
        params![key, value],
    )?;
    Ok(())
}

pub(crate) fn get_setting_i64(conn: &Connection, key: &str) -> Result<Option<i64>> {
    Ok(get_setting(conn, key)?.and_then(|v| v.trim().parse::<i64>().ok()))
}

pub(crate) fn set_setting_i64(conn: &Connection, key: &str, value: i64) -> Result<()> {
    set_setting(conn, key, &value.to_string())
}

pub(crate) fn ensure_setting_defaults(conn: &Connection, defaults: &[(&str, String)]) -> Result<()> {
    with_immediate_transaction(conn, || {
        let mut stmt = conn.prepare(r#"INSERT OR IGNORE INTO kv(key, value) VALUES (?1, ?2)"#)?;
        for (key, value) in defaults {
            stmt.execute(params![key, value])?;
        }
        Ok(())
    })
}
