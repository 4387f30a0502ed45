use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::db::AssetLocator;
use crate::error::AssetIoError;

const BLOBS_DIR: &str = "blobs";

/// On-device area holding asset bytes, addressed by generated file names.
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(app_dir: &Path) -> Result<Self> {
        let root = app_dir.join(BLOBS_DIR);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `bytes` under a fresh name and returns its local locator.
    pub fn import(&self, bytes: &[u8], extension: &str) -> Result<AssetLocator> {
        let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        if !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("invalid asset extension: {extension}"));
        }
        let file = if extension.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            format!("{}.{extension}", uuid::Uuid::new_v4())
        };

        let path = self.path_for(&file)?;
        let tmp = self.root.join(format!(".{file}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(AssetLocator::local(file))
    }

    pub fn read(&self, file: &str) -> Result<Vec<u8>> {
        let path = self.path_for(file)?;
        fs::read(path).map_err(|source| {
            AssetIoError {
                file: file.to_string(),
                source,
            }
            .into()
        })
    }

    pub fn contains(&self, file: &str) -> bool {
        self.path_for(file).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Deletes a file; a missing file is not an error. Only the media migrator calls this.
    pub(crate) fn remove(&self, file: &str) -> Result<bool> {
        let path = self.path_for(file)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(AssetIoError {
                file: file.to_string(),
                source,
            }
            .into()),
        }
    }

    fn path_for(&self, file: &str) -> Result<PathBuf> {
        let mut components = Path::new(file).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(file)),
            _ => Err(anyhow!("invalid blob file name: {file:?}")),
        }
    }
}

pub fn content_type_for(file: &str) -> &'static str {
    let extension = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
