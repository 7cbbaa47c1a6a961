//! Restore pipeline: put an asset back to its uploaded state.
//!
//! Restoring reads only the backup registry; no pixels are touched. The
//! `-orig` entries become the current full size and renditions again. What
//! they replace is archived under a fresh suffix, or deleted in overwrite mode
//! when it is an edited file. The `-orig` entries themselves stay, so an asset
//! can be edited and restored any number of times.

use crate::backup::{BackupEntry, FULL, SuffixSource, SystemSuffix};
use crate::config::EditorConfig;
use crate::edit::discard_files;
use crate::naming::{is_edited_full, is_edited_rendition};
use crate::store::{AttachmentStore, StoreError};
use crate::types::{AssetId, ImageMetadata};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Image data does not exist for asset {0}")]
    NoImageData(AssetId),
    #[error("Cannot load image metadata: no backups recorded for asset {0}")]
    NoBackupData(AssetId),
    #[error("Image metadata is inconsistent: the full-size file of {0} is already the original")]
    Inconsistent(AssetId),
    #[error("Cannot save image metadata: {0}")]
    MetadataInconsistent(#[source] StoreError),
    #[error("Cannot load image metadata: {0}")]
    Store(#[source] StoreError),
    #[error("Asset {0} is being edited elsewhere")]
    AssetBusy(AssetId),
}

impl RestoreError {
    /// Stable identifier for the caller-facing error response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoImageData(_) => "no_image_data",
            Self::NoBackupData(_) => "no_backup_data",
            Self::Inconsistent(_) => "inconsistent",
            Self::MetadataInconsistent(_) => "metadata_inconsistent",
            Self::Store(_) => "store",
            Self::AssetBusy(_) => "asset_busy",
        }
    }
}

fn store_error(err: StoreError) -> RestoreError {
    match err {
        StoreError::Busy(id) => RestoreError::AssetBusy(id),
        other => RestoreError::Store(other),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreSummary {
    pub width: u32,
    pub height: u32,
    pub file: PathBuf,
    /// Backup tags the replaced edits were archived under.
    pub archived: Vec<String>,
    /// Edited files deleted in overwrite mode.
    pub purged: Vec<PathBuf>,
}

pub struct RestorePipeline<'a, S: AttachmentStore> {
    store: &'a S,
    config: &'a EditorConfig,
    suffixes: &'a dyn SuffixSource,
}

impl<'a, S: AttachmentStore> RestorePipeline<'a, S> {
    pub fn new(store: &'a S, config: &'a EditorConfig) -> Self {
        Self {
            store,
            config,
            suffixes: &SystemSuffix,
        }
    }

    pub fn with_suffixes(mut self, suffixes: &'a dyn SuffixSource) -> Self {
        self.suffixes = suffixes;
        self
    }

    #[tracing::instrument(skip(self, id), fields(asset = %id))]
    pub fn restore(&self, id: &AssetId) -> Result<RestoreSummary, RestoreError> {
        let _lock = self
            .store
            .lock(id, self.config.lock_timeout())
            .map_err(store_error)?;

        let meta = self
            .store
            .load_metadata(id)
            .map_err(store_error)?
            .ok_or_else(|| RestoreError::NoImageData(id.clone()))?;
        let registry = match self.store.load_backup_registry(id) {
            Ok(r) if !r.is_empty() => r,
            Ok(_) | Err(StoreError::Malformed { .. }) => {
                return Err(RestoreError::NoBackupData(id.clone()));
            }
            Err(e) => return Err(store_error(e)),
        };

        let overwrite = self.config.overwrite;
        let suffix = self.suffixes.seed();
        let mut new_meta = meta.clone();
        let mut new_registry = registry.clone();
        let mut archived = Vec::new();
        let mut doomed = Vec::new();
        let mut restored = false;

        if let Some(orig) = registry.restore_orig(FULL) {
            let current = meta.basename();
            if current != orig.file {
                if overwrite {
                    if is_edited_full(&current) && !registry.references_file(FULL, &current) {
                        doomed.push(meta.file.clone());
                    }
                } else if meta.has_dimensions() {
                    let entry = BackupEntry {
                        width: meta.width,
                        height: meta.height,
                        file: current,
                    };
                    archived.extend(new_registry.archive_version(FULL, &entry, suffix));
                }
            }
            let restored_file = meta.sibling(&orig.file);
            restored = restored_file != meta.file;
            new_meta.file = restored_file;
            new_meta.width = orig.width;
            new_meta.height = orig.height;
        }

        for spec in &self.config.sizes {
            let name = spec.name.as_str();
            let current = meta.sizes.get(name);
            match registry.restore_orig(name) {
                Some(orig) => {
                    if let Some(current) = current
                        && current.file != orig.file
                    {
                        if overwrite {
                            if is_edited_rendition(&current.file)
                                && !registry.references_file(name, &current.file)
                            {
                                doomed.push(meta.sibling(&current.file));
                            }
                        } else {
                            archived.extend(new_registry.archive_version(
                                name,
                                &current.clone().into(),
                                suffix,
                            ));
                        }
                    }
                    new_meta.sizes.insert(name.to_string(), orig.into());
                }
                // Only renditions an edit created lack an -orig entry.
                None => {
                    if let Some(current) = current
                        && is_edited_rendition(&current.file)
                    {
                        debug!(size = name, file = %current.file, "dropping rendition with no original");
                        if overwrite && !registry.references_file(name, &current.file) {
                            doomed.push(meta.sibling(&current.file));
                        }
                        new_meta.sizes.remove(name);
                    }
                }
            }
        }

        if new_meta != meta || new_registry != registry {
            self.store
                .commit(id, &new_meta, &new_registry)
                .map_err(RestoreError::MetadataInconsistent)?;
            discard_files(self.store, &doomed);
        } else {
            doomed.clear();
        }

        if !restored {
            return Err(RestoreError::Inconsistent(id.clone()));
        }

        info!(file = %new_meta.file.display(), "image restored");
        Ok(summary(new_meta, archived, doomed))
    }
}

fn summary(meta: ImageMetadata, archived: Vec<String>, purged: Vec<PathBuf>) -> RestoreSummary {
    RestoreSummary {
        width: meta.width,
        height: meta.height,
        file: meta.file,
        archived,
        purged,
    }
}
