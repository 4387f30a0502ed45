use std::sync::{Arc, Mutex};

use crate::progress::{SyncProgress, SyncStatus, UploadEvent};
use crate::remote::RemoteGateway;

use super::core::SyncEngine;

/// Receives one JSON document per event, for UI bridges that only move strings.
pub type JsonSink = Arc<dyn Fn(String) + Send + Sync>;

fn emit_progress(
    sink: &JsonSink,
    last: &Mutex<Option<(SyncStatus, u64, u64)>>,
    progress: &SyncProgress,
) {
    let next = (progress.status, progress.completed, progress.total);
    if let Ok(mut last) = last.lock() {
        if last.as_ref() == Some(&next) {
            return;
        }
        *last = Some(next);
    }

    let mut payload = serde_json::json!({
        "type": "progress",
        "status": progress.status,
        "done": progress.completed,
        "total": progress.total,
    });
    if let Some(message) = &progress.message {
        payload["message"] = serde_json::Value::String(message.clone());
    }
    sink(payload.to_string());
}

fn emit_upload(sink: &JsonSink, event: &UploadEvent) {
    let payload = serde_json::json!({
        "type": "upload",
        "event": event,
    })
    .to_string();
    sink(payload);
}

/// Forwards status changes (deduplicated) and upload events to `sink` as JSON strings.
/// Replaces any existing subscribers on `engine`.
pub fn subscribe_json<R: RemoteGateway>(engine: &SyncEngine<R>, sink: JsonSink) {
    let last = Arc::new(Mutex::new(None));
    let status_sink = Arc::clone(&sink);
    engine.subscribe_progress(move |progress| emit_progress(&status_sink, &last, progress));
    engine.subscribe_uploads(move |event| emit_upload(&sink, event));
}
