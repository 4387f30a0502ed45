//! Sync status and upload progress notifications.
//!
//! Each notifier holds at most one subscriber; subscribing again replaces the previous
//! callback. Nothing here feeds back into the reconciler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Single-subscriber, last-subscriber-wins fan-out.
pub struct Notifier<E> {
    subscriber: Mutex<Option<Callback<E>>>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self {
            subscriber: Mutex::new(None),
        }
    }
}

impl<E> Notifier<E> {
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.subscriber.lock() {
            *slot = Some(Arc::new(callback));
        }
    }

    pub fn unsubscribe(&self) {
        if let Ok(mut slot) = self.subscriber.lock() {
            *slot = None;
        }
    }

    pub fn emit(&self, event: &E) {
        // Call outside the lock so a callback may resubscribe.
        let callback = match self.subscriber.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub status: SyncStatus,
    pub completed: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncProgress {
    fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            completed: 0,
            total: 0,
            message: None,
        }
    }
}

/// Per-file upload events. `Started` is sent once the bytes have been read, so a file that
/// cannot be read produces a lone `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    Started {
        file_name: String,
        total_bytes: u64,
    },
    Progress {
        file_name: String,
        sent_bytes: u64,
        total_bytes: u64,
    },
    Finished {
        file_name: String,
        url: String,
    },
    Failed {
        file_name: String,
        message: String,
    },
}

impl UploadEvent {
    pub fn file_name(&self) -> &str {
        match self {
            UploadEvent::Started { file_name, .. }
            | UploadEvent::Progress { file_name, .. }
            | UploadEvent::Finished { file_name, .. }
            | UploadEvent::Failed { file_name, .. } => file_name,
        }
    }
}

struct BusInner {
    state: Mutex<SyncProgress>,
    // Bumped on every start/finish/error; a pending revert only fires if still current.
    generation: AtomicU64,
    display_interval: Duration,
    status: Notifier<SyncProgress>,
    uploads: Notifier<UploadEvent>,
}

#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<BusInner>,
}

impl ProgressBus {
    pub fn new(display_interval: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(SyncProgress::idle()),
                generation: AtomicU64::new(0),
                display_interval,
                status: Notifier::default(),
                uploads: Notifier::default(),
            }),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&SyncProgress) + Send + Sync + 'static) {
        self.inner.status.subscribe(callback);
    }

    pub fn subscribe_uploads(&self, callback: impl Fn(&UploadEvent) + Send + Sync + 'static) {
        self.inner.uploads.subscribe(callback);
    }

    pub fn unsubscribe_all(&self) {
        self.inner.status.unsubscribe();
        self.inner.uploads.unsubscribe();
    }

    pub fn snapshot(&self) -> SyncProgress {
        match self.inner.state.lock() {
            Ok(state) => state.clone(),
            Err(_) => SyncProgress::idle(),
        }
    }

    pub fn start(&self, total: u64) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.update(|state| {
            *state = SyncProgress {
                status: SyncStatus::Syncing,
                completed: 0,
                total,
                message: None,
            };
        });
    }

    pub fn item_completed(&self) {
        self.update(|state| {
            state.completed = state.completed.saturating_add(1);
        });
    }

    pub fn finish(&self) {
        self.terminal(SyncStatus::Success, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.terminal(SyncStatus::Error, Some(message.into()));
    }

    pub fn upload(&self, event: UploadEvent) {
        self.inner.uploads.emit(&event);
    }

    fn terminal(&self, status: SyncStatus, message: Option<String>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|state| {
            state.status = status;
            state.message = message;
        });

        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            thread::sleep(inner.display_interval);
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let snapshot = {
                let Ok(mut state) = inner.state.lock() else {
                    return;
                };
                *state = SyncProgress::idle();
                state.clone()
            };
            inner.status.emit(&snapshot);
        });
    }

    fn update(&self, f: impl FnOnce(&mut SyncProgress)) {
        let snapshot = {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            f(&mut state);
            state.clone()
        };
        self.inner.status.emit(&snapshot);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(crate::config::SyncConfig::default().status_display_interval)
    }
}
