//! Attachment store: per-asset metadata and backup registry.
//!
//! The pipelines never touch persistence directly; they go through
//! [`AttachmentStore`], which also owns the library root all image paths are
//! relative to.
//!
//! ## Filesystem layout
//!
//! [`FsStore`] keeps one JSON record per asset under the library root:
//!
//! ```text
//! library/
//! ├── retouch.toml
//! ├── 2024/beach.jpg                 # image files, wherever the user put them
//! ├── 2024/beach-150x150.jpg
//! └── .retouch/
//!     ├── beach.json                 # {"metadata": {...}, "backup_sizes": {...}}
//!     └── beach.lock                 # advisory lock, held during edit/restore
//! ```
//!
//! Records are written to a temporary file and renamed into place, so a
//! [`commit`](AttachmentStore::commit) of metadata and registry is one atomic
//! write.

use crate::backup::BackupRegistry;
use crate::types::{AssetId, ImageMetadata};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Directory under the library root holding asset records.
pub const STORE_DIR: &str = ".retouch";

/// Polling interval while waiting for a busy asset.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed record for asset {asset}: {source}")]
    Malformed {
        asset: AssetId,
        #[source]
        source: serde_json::Error,
    },
    #[error("Asset {0} is being edited elsewhere")]
    Busy(AssetId),
}

/// Held while an asset is being edited. Released on drop.
#[derive(Debug)]
pub struct AssetLock {
    file: Option<File>,
}

impl AssetLock {
    /// A guard that holds nothing, for stores without cross-process locking.
    pub fn none() -> Self {
        Self { file: None }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

/// Persistent storage for asset metadata and backup registries.
pub trait AttachmentStore {
    /// Directory all metadata paths are relative to.
    fn root(&self) -> &Path;

    fn load_metadata(&self, id: &AssetId) -> Result<Option<ImageMetadata>, StoreError>;

    fn save_metadata(&self, id: &AssetId, meta: &ImageMetadata) -> Result<(), StoreError>;

    /// A missing registry is empty; an unreadable one is [`StoreError::Malformed`].
    fn load_backup_registry(&self, id: &AssetId) -> Result<BackupRegistry, StoreError>;

    fn save_backup_registry(&self, id: &AssetId, registry: &BackupRegistry)
    -> Result<(), StoreError>;

    /// Persist metadata and registry as one logical write.
    fn commit(
        &self,
        id: &AssetId,
        meta: &ImageMetadata,
        registry: &BackupRegistry,
    ) -> Result<(), StoreError> {
        self.save_metadata(id, meta)?;
        self.save_backup_registry(id, registry)
    }

    /// Take the per-asset write lock, waiting up to `timeout`.
    fn lock(&self, id: &AssetId, timeout: Duration) -> Result<AssetLock, StoreError>;

    /// Absolute path of a file relative to the root.
    fn resolve(&self, relative: &Path) -> PathBuf {
        self.root().join(relative)
    }

    fn file_exists(&self, relative: &Path) -> bool {
        self.resolve(relative).exists()
    }

    fn delete_file(&self, relative: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(relative))
    }
}

/// On-disk record. The registry stays raw so a damaged registry does not
/// make the metadata unreadable.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AssetRecord {
    #[serde(default)]
    metadata: Option<ImageMetadata>,
    #[serde(default)]
    backup_sizes: serde_json::Value,
}

/// Filesystem-backed store rooted at the image library.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    fn record_path(&self, id: &AssetId) -> PathBuf {
        self.record_dir().join(format!("{}.json", id))
    }

    fn lock_path(&self, id: &AssetId) -> PathBuf {
        self.record_dir().join(format!("{}.lock", id))
    }

    fn read_record(&self, id: &AssetId) -> Result<AssetRecord, StoreError> {
        let content = match fs::read_to_string(self.record_path(id)) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AssetRecord::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            asset: id.clone(),
            source,
        })
    }

    fn write_record(&self, id: &AssetId, record: &AssetRecord) -> Result<(), StoreError> {
        fs::create_dir_all(self.record_dir())?;
        let path = self.record_path(id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record).map_err(io::Error::from)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn try_lock(path: &Path) -> io::Result<Option<File>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl AttachmentStore for FsStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load_metadata(&self, id: &AssetId) -> Result<Option<ImageMetadata>, StoreError> {
        Ok(self.read_record(id)?.metadata)
    }

    fn save_metadata(&self, id: &AssetId, meta: &ImageMetadata) -> Result<(), StoreError> {
        let mut record = self.read_record(id)?;
        record.metadata = Some(meta.clone());
        self.write_record(id, &record)
    }

    fn load_backup_registry(&self, id: &AssetId) -> Result<BackupRegistry, StoreError> {
        let record = self.read_record(id)?;
        if record.backup_sizes.is_null() {
            return Ok(BackupRegistry::new());
        }
        serde_json::from_value(record.backup_sizes).map_err(|source| StoreError::Malformed {
            asset: id.clone(),
            source,
        })
    }

    fn save_backup_registry(
        &self,
        id: &AssetId,
        registry: &BackupRegistry,
    ) -> Result<(), StoreError> {
        let mut record = self.read_record(id)?;
        record.backup_sizes = serde_json::to_value(registry).map_err(io::Error::from)?;
        self.write_record(id, &record)
    }

    fn commit(
        &self,
        id: &AssetId,
        meta: &ImageMetadata,
        registry: &BackupRegistry,
    ) -> Result<(), StoreError> {
        let record = AssetRecord {
            metadata: Some(meta.clone()),
            backup_sizes: serde_json::to_value(registry).map_err(io::Error::from)?,
        };
        self.write_record(id, &record)
    }

    fn lock(&self, id: &AssetId, timeout: Duration) -> Result<AssetLock, StoreError> {
        fs::create_dir_all(self.record_dir())?;
        let path = self.lock_path(id);
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(file) = Self::try_lock(&path)? {
                return Ok(AssetLock { file: Some(file) });
            }
            if Instant::now() >= deadline {
                return Err(StoreError::Busy(id.clone()));
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}
