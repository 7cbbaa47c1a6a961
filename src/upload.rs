//! Register an image already in the library as a new asset.
//!
//! Importing reads the file, generates every configured rendition next to
//! it and records the metadata with an empty backup registry. The uploaded
//! file is never modified, which is what later restores return to.

use crate::backup::BackupRegistry;
use crate::config::EditorConfig;
use crate::edit::{discard_files, write_rendition};
use crate::imaging::{BackendError, ImageBackend, ImageEditor, MimeType};
use crate::store::{AttachmentStore, StoreError};
use crate::types::{AssetId, ImageMetadata};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Asset {0} already exists")]
    AlreadyExists(AssetId),
    #[error("Invalid image path {0}: must be relative to the library root")]
    InvalidPath(String),
    #[error("Unsupported image type: {0}")]
    UnsupportedFormat(String),
    #[error("Unable to process the image: {0}")]
    Backend(#[source] BackendError),
    #[error("Cannot save image metadata: {0}")]
    Store(#[source] StoreError),
    #[error("Asset {0} is being edited elsewhere")]
    AssetBusy(AssetId),
}

impl UploadError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidPath(_) => "invalid_path",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Backend(_) => "backend",
            Self::Store(_) => "store",
            Self::AssetBusy(_) => "asset_busy",
        }
    }
}

fn store_error(err: StoreError) -> UploadError {
    match err {
        StoreError::Busy(id) => UploadError::AssetBusy(id),
        other => UploadError::Store(other),
    }
}

/// Paths must stay inside the library root.
fn check_relative(file: &Path) -> Result<(), UploadError> {
    let escapes = file.as_os_str().is_empty()
        || file
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(UploadError::InvalidPath(file.display().to_string()));
    }
    Ok(())
}

/// Import `file` (relative to the store root) as asset `id`.
#[tracing::instrument(skip(backend, store, config, id), fields(asset = %id))]
pub fn import<B: ImageBackend, S: AttachmentStore>(
    backend: &B,
    store: &S,
    config: &EditorConfig,
    id: &AssetId,
    file: &Path,
) -> Result<ImageMetadata, UploadError> {
    check_relative(file)?;
    let mime = MimeType::from_path(file)
        .ok_or_else(|| UploadError::UnsupportedFormat(file.display().to_string()))?;

    let _lock = store
        .lock(id, config.lock_timeout())
        .map_err(store_error)?;
    if store.load_metadata(id).map_err(store_error)?.is_some() {
        return Err(UploadError::AlreadyExists(id.clone()));
    }

    let editor = backend
        .open(&store.resolve(file))
        .map_err(UploadError::Backend)?;
    let size = editor.get_size();

    let quality = config.quality();
    let mut written = Vec::new();
    let mut sizes = BTreeMap::new();
    for spec in &config.sizes {
        match write_rendition(
            store,
            &editor,
            spec.width,
            spec.height,
            spec.crop,
            file,
            mime,
            quality,
            &mut written,
        ) {
            Ok(Some(descriptor)) => {
                debug!(size = %spec.name, file = %descriptor.file, "rendition written");
                sizes.insert(spec.name.clone(), descriptor);
            }
            Ok(None) => debug!(size = %spec.name, "source too small, no rendition"),
            Err(e) => {
                discard_files(store, &written);
                return Err(UploadError::Backend(e));
            }
        }
    }

    let meta = ImageMetadata {
        file: file.to_path_buf(),
        width: size.width,
        height: size.height,
        sizes,
    };
    if let Err(e) = store.commit(id, &meta, &BackupRegistry::new()) {
        discard_files(store, &written);
        return Err(store_error(e));
    }
    info!(
        file = %file.display(),
        width = size.width,
        height = size.height,
        renditions = meta.sizes.len(),
        "image imported"
    );
    Ok(meta)
}
