use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::db::{AssetLocator, Record, RecordKind};
use crate::error::NotFound;

pub mod http;

/// Record shape exchanged with the remote. Asset entries are always object-store URLs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemotePayload {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub fields: serde_json::Value,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl RemotePayload {
    /// Fails if any locator is still local.
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut assets = Vec::with_capacity(record.assets.len());
        for asset in &record.assets {
            match asset {
                AssetLocator::Remote { url } => assets.push(url.clone()),
                AssetLocator::Local { file } => {
                    return Err(anyhow!(
                        "{} {} still references local asset {file}",
                        record.kind,
                        record.id
                    ))
                }
            }
        }
        Ok(Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            fields: record.fields.clone(),
            assets,
            updated_at_ms: record.updated_at_ms,
        })
    }
}

/// Remote record and object store. Every call must be idempotent: retrying an upsert or
/// delete with the same id/path is safe. Missing targets are reported as `NotFound`.
pub trait RemoteGateway: Send + Sync {
    fn target_id(&self) -> &str;

    fn upsert(&self, kind: RecordKind, payload: &RemotePayload) -> Result<()>;
    fn delete(&self, kind: RecordKind, id: &str) -> Result<()>;
    fn list_all(&self, kind: RecordKind) -> Result<Vec<RemotePayload>>;

    /// Stores bytes and returns the object's resolvable URL.
    fn put_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
    fn delete_object(&self, path: &str) -> Result<()>;
    /// Inverse of the URL returned by `put_object`, if the URL belongs to this store.
    fn object_path_from_url(&self, url: &str) -> Option<String>;
}

static INMEM_NEXT_ID: AtomicU64 = AtomicU64::new(1);

const INMEM_OBJECT_BASE_URL: &str = "https://storage.inmem.invalid/objects/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct InMemoryRemoteGateway {
    target_id: String,
    records: Mutex<BTreeMap<(RecordKind, String), RemotePayload>>,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    object_puts: AtomicUsize,
    calls: AtomicUsize,
}

impl InMemoryRemoteGateway {
    pub fn new() -> Self {
        let id = INMEM_NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            target_id: format!("inmem:{id}"),
            records: Mutex::new(BTreeMap::new()),
            objects: Mutex::new(BTreeMap::new()),
            object_puts: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Total number of gateway calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn object_put_count(&self) -> usize {
        self.object_puts.load(Ordering::Relaxed)
    }

    pub fn record(&self, kind: RecordKind, id: &str) -> Option<RemotePayload> {
        let records = self.records.lock().ok()?;
        records.get(&(kind, id.to_string())).cloned()
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        let objects = self.objects.lock().ok()?;
        objects.get(path).cloned()
    }

    pub fn object_paths(&self) -> Vec<String> {
        match self.objects.lock() {
            Ok(objects) => objects.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn track_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for InMemoryRemoteGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_object_path(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|part| part.is_empty() || part == "..") {
        return Err(anyhow!("invalid object path: {path:?}"));
    }
    Ok(trimmed.to_string())
}

impl RemoteGateway for InMemoryRemoteGateway {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn upsert(&self, kind: RecordKind, payload: &RemotePayload) -> Result<()> {
        self.track_call();
        let mut records = self.records.lock().map_err(|_| anyhow!("poisoned lock"))?;
        records.insert((kind, payload.id.clone()), payload.clone());
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        self.track_call();
        let mut records = self.records.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if records.remove(&(kind, id.to_string())).is_none() {
            return Err(NotFound {
                path: format!("{kind}/{id}"),
            }
            .into());
        }
        Ok(())
    }

    fn list_all(&self, kind: RecordKind) -> Result<Vec<RemotePayload>> {
        self.track_call();
        let records = self.records.lock().map_err(|_| anyhow!("poisoned lock"))?;
        Ok(records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, payload)| payload.clone())
            .collect())
    }

    fn put_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.track_call();
        self.object_puts.fetch_add(1, Ordering::Relaxed);
        let path = normalize_object_path(path)?;
        let mut objects = self.objects.lock().map_err(|_| anyhow!("poisoned lock"))?;
        objects.insert(
            path.clone(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{INMEM_OBJECT_BASE_URL}{path}"))
    }

    fn delete_object(&self, path: &str) -> Result<()> {
        self.track_call();
        let path = normalize_object_path(path)?;
        let mut objects = self.objects.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if objects.remove(&path).is_none() {
            return Err(NotFound { path }.into());
        }
        Ok(())
    }

    fn object_path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(INMEM_OBJECT_BASE_URL)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_remote_assets() {
        let mut record = Record {
            kind: RecordKind::Memory,
            id: "m1".to_string(),
            owner_id: Some("p1".to_string()),
            fields: serde_json::json!({"title": "t"}),
            assets: vec![AssetLocator::local("a.jpg")],
            dirty: true,
            tombstoned: false,
            rev: 1,
            updated_at_ms: 7,
        };
        assert!(RemotePayload::from_record(&record).is_err());

        record.assets = vec![AssetLocator::remote("https://cdn.test/a.jpg")];
        let payload = RemotePayload::from_record(&record).expect("payload");
        assert_eq!(payload.assets, vec!["https://cdn.test/a.jpg".to_string()]);
        assert_eq!(payload.owner_id.as_deref(), Some("p1"));
    }

    #[test]
    fn inmem_delete_of_missing_record_is_not_found() {
        let remote = InMemoryRemoteGateway::new();
        let err = remote.delete(RecordKind::Story, "s1").expect_err("missing");
        assert!(err.is::<NotFound>());
    }

    #[test]
    fn inmem_object_urls_roundtrip_to_paths() {
        let remote = InMemoryRemoteGateway::new();
        let url = remote
            .put_object("/p1/photos/x.jpg", b"x".to_vec(), "image/jpeg")
            .expect("put");
        assert!(url.starts_with("https://"));
        assert_eq!(
            remote.object_path_from_url(&url).as_deref(),
            Some("p1/photos/x.jpg")
        );
        assert_eq!(remote.object_path_from_url("https://elsewhere.test/x.jpg"), None);
        assert!(remote.put_object("p1/../x.jpg", vec![], "image/jpeg").is_err());
    }
}
