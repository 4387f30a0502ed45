// The reconciler is split into one file per phase. The pieces are `include!`'d so everything
// remains in `crate::sync`.

use std::collections::BTreeSet;
use std::sync::{mpsc, Mutex, TryLockError};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64_URL;
use base64::Engine as _;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::blob::BlobStore;
use crate::config::SyncConfig;
use crate::db::{self, AssetRewrite, Record, RecordKind};
use crate::error::{classify_item_error, ItemErrorKind, NotFound, SyncError, Unreachable};
use crate::media::MediaMigrator;
use crate::progress::ProgressBus;
use crate::remote::{RemoteGateway, RemotePayload};

include!("parts/01_prelude.rs");
include!("parts/02_delete.rs");
include!("parts/03_push.rs");
include!("parts/04_pull.rs");
