// The local store is split into smaller files; the pieces are `include!`'d so everything
// remains in `crate::db`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

include!("parts/01_records_model.rs");
include!("parts/02_migrate.rs");
include!("parts/03_kv.rs");
include!("parts/04_local_writes.rs");
include!("parts/05_sync_writes.rs");
