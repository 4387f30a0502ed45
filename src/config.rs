use std::time::Duration;

use anyhow::Result;
use rusqlite::Connection;

use crate::db;

const KV_REQUEST_TIMEOUT_MS: &str = "sync.request_timeout_ms";
const KV_UPLOAD_PARALLELISM: &str = "sync.upload_parallelism";
const KV_STATUS_DISPLAY_MS: &str = "sync.status_display_ms";

const DEFAULT_REQUEST_TIMEOUT_MS: i64 = 30_000;
const DEFAULT_UPLOAD_PARALLELISM: i64 = 3;
const DEFAULT_STATUS_DISPLAY_MS: i64 = 2_000;

const MAX_UPLOAD_PARALLELISM: i64 = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Per remote call; a timeout is a per-record failure.
    pub request_timeout: Duration,
    /// Worker threads used for asset uploads and upserts.
    pub upload_parallelism: usize,
    /// How long a terminal success/error status stays visible before reverting to idle.
    pub status_display_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS as u64),
            upload_parallelism: DEFAULT_UPLOAD_PARALLELISM as usize,
            status_display_interval: Duration::from_millis(DEFAULT_STATUS_DISPLAY_MS as u64),
        }
    }
}

pub(crate) fn ensure_sync_config_defaults(conn: &Connection) -> Result<()> {
    let defaults = vec![
        (KV_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS.to_string()),
        (KV_UPLOAD_PARALLELISM, DEFAULT_UPLOAD_PARALLELISM.to_string()),
        (KV_STATUS_DISPLAY_MS, DEFAULT_STATUS_DISPLAY_MS.to_string()),
    ];
    db::ensure_setting_defaults(conn, &defaults)
}

fn millis_or(value: Option<i64>, default_ms: i64, min_ms: i64) -> Duration {
    let ms = match value {
        Some(v) if v >= min_ms => v,
        Some(_) => min_ms,
        None => default_ms,
    };
    Duration::from_millis(ms as u64)
}

pub fn load_sync_config(conn: &Connection) -> Result<SyncConfig> {
    let request_timeout = millis_or(
        db::get_setting_i64(conn, KV_REQUEST_TIMEOUT_MS)?,
        DEFAULT_REQUEST_TIMEOUT_MS,
        1_000,
    );
    let upload_parallelism = db::get_setting_i64(conn, KV_UPLOAD_PARALLELISM)?
        .unwrap_or(DEFAULT_UPLOAD_PARALLELISM)
        .clamp(1, MAX_UPLOAD_PARALLELISM) as usize;
    let status_display_interval = millis_or(
        db::get_setting_i64(conn, KV_STATUS_DISPLAY_MS)?,
        DEFAULT_STATUS_DISPLAY_MS,
        0,
    );

    Ok(SyncConfig {
        request_timeout,
        upload_parallelism,
        status_display_interval,
    })
}

pub fn save_sync_config(conn: &Connection, config: &SyncConfig) -> Result<()> {
    db::set_setting_i64(
        conn,
        KV_REQUEST_TIMEOUT_MS,
        config.request_timeout.as_millis().try_into().unwrap_or(i64::MAX),
    )?;
    db::set_setting_i64(
        conn,
        KV_UPLOAD_PARALLELISM,
        config.upload_parallelism.try_into().unwrap_or(MAX_UPLOAD_PARALLELISM),
    )?;
    db::set_setting_i64(
        conn,
        KV_STATUS_DISPLAY_MS,
        config
            .status_display_interval
            .as_millis()
            .try_into()
            .unwrap_or(i64::MAX),
    )?;
    Ok(())
}
