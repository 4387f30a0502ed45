use serde::Serialize;
use thiserror::Error;

/// The remote (or local blob area) has nothing at `path`.
#[derive(Debug, Error)]
#[error("not found: {path}")]
pub struct NotFound {
    pub path: String,
}

/// Server-side validation or authorization failure for a single request.
#[derive(Debug, Error)]
#[error("remote rejected {path}: HTTP {status} {message}")]
pub struct Rejected {
    pub path: String,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("asset io failure for {file}: {source}")]
pub struct AssetIoError {
    pub file: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Unreachable {
    #[error("offline")]
    Offline,
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Errors that end a sync pass as a whole.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync unreachable: {0}")]
    Unreachable(Unreachable),

    #[error("a sync pass is already running")]
    PassInFlight,

    #[error("local storage fault: {0:#}")]
    StorageFault(#[source] anyhow::Error),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Unreachable(Unreachable::Offline) => "offline",
            SyncError::Unreachable(Unreachable::Unauthenticated) => "unauthenticated",
            SyncError::PassInFlight => "pass_in_flight",
            SyncError::StorageFault(_) => "storage_fault",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    RemoteRejected,
    AssetIo,
    Transport,
}

pub fn classify_item_error(e: &anyhow::Error) -> ItemErrorKind {
    if e.is::<Rejected>() {
        return ItemErrorKind::RemoteRejected;
    }
    if e.is::<AssetIoError>() {
        return ItemErrorKind::AssetIo;
    }
    ItemErrorKind::Transport
}
