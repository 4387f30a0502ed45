use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::blob::{content_type_for, BlobStore};
use crate::db::{AssetLocator, AssetRewrite, Record};
use crate::error::NotFound;
use crate::progress::{ProgressBus, UploadEvent};
use crate::remote::RemoteGateway;

/// Moves asset bytes from the blob store into remote object storage.
///
/// Upload and local deletion are separate steps: `migrate` uploads and returns the rewrite,
/// the caller persists the rewritten locator, and only then `commit` removes the local file.
/// A crash between the two leaves the locator local and the file in place, so the next pass
/// uploads again (the earlier object becomes an orphan).
pub struct MediaMigrator<'a, R: RemoteGateway> {
    blobs: &'a BlobStore,
    remote: &'a R,
    progress: &'a ProgressBus,
}

impl<'a, R: RemoteGateway> MediaMigrator<'a, R> {
    pub fn new(blobs: &'a BlobStore, remote: &'a R, progress: &'a ProgressBus) -> Self {
        Self {
            blobs,
            remote,
            progress,
        }
    }

    /// `{owner}/{category}/{unique file}` for an asset of `record`.
    pub fn object_path(record: &Record, file: &str) -> String {
        let unique = match file.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("{}.{ext}", uuid::Uuid::new_v4()),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        format!(
            "{}/{}/{unique}",
            record.storage_owner_id(),
            record.kind.asset_category()
        )
    }

    /// Uploads a local asset. Remote locators are returned as `None` without any network call.
    ///
    /// Emits `Started` after the file is read and `Finished` or `Failed` at the end; an
    /// unreadable file yields only `Failed`.
    pub fn migrate(&self, record: &Record, locator: &AssetLocator) -> Result<Option<AssetRewrite>> {
        let Some(file) = locator.local_file() else {
            return Ok(None);
        };

        match self.upload(record, file) {
            Ok(url) => {
                self.progress.upload(UploadEvent::Finished {
                    file_name: file.to_string(),
                    url: url.clone(),
                });
                Ok(Some(AssetRewrite {
                    local: locator.clone(),
                    remote: AssetLocator::remote(url),
                }))
            }
            Err(e) => {
                self.progress.upload(UploadEvent::Failed {
                    file_name: file.to_string(),
                    message: format!("{e:#}"),
                });
                Err(e)
            }
        }
    }

    fn upload(&self, record: &Record, file: &str) -> Result<String> {
        let bytes = self.blobs.read(file)?;
        let total_bytes = bytes.len() as u64;
        self.progress.upload(UploadEvent::Started {
            file_name: file.to_string(),
            total_bytes,
        });

        let path = Self::object_path(record, file);
        debug!(kind = %record.kind, id = %record.id, %path, total_bytes, "uploading asset");
        let url = self
            .remote
            .put_object(&path, bytes, content_type_for(file))
            .with_context(|| format!("upload {file} for {} {}", record.kind, record.id))?;

        self.progress.upload(UploadEvent::Progress {
            file_name: file.to_string(),
            sent_bytes: total_bytes,
            total_bytes,
        });
        Ok(url)
    }

    /// Deletes the local copy of a migrated asset. Call only after the rewritten locator is
    /// durable. Failure leaves an unreferenced file behind and is only logged.
    pub fn commit(&self, rewrite: &AssetRewrite) {
        let Some(file) = rewrite.local.local_file() else {
            return;
        };
        if let Err(e) = self.blobs.remove(file) {
            warn!(file, "failed to remove migrated local asset: {e:#}");
        }
    }

    /// Removes the bytes behind a tombstoned record's locator, local or remote.
    pub fn discard(&self, locator: &AssetLocator) -> Result<()> {
        match locator {
            AssetLocator::Local { file } => {
                self.blobs.remove(file)?;
                Ok(())
            }
            AssetLocator::Remote { url } => {
                let Some(path) = self.remote.object_path_from_url(url) else {
                    warn!(url, "remote asset is not in this object store; leaving it");
                    return Ok(());
                };
                match self.remote.delete_object(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.is::<NotFound>() => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
