//! Edit pipeline: apply a history to an asset and save a new version.
//!
//! ## Stages
//!
//! 1. **Load**: metadata from the store, pixels through the [`ImageBackend`].
//! 2. **Transform**: either a direct scale (aspect ratio checked) or the
//!    canonical operation log, crops mapped from preview to full resolution.
//! 3. **Write**: the edited full-size image under a fresh `-e<suffix>` name,
//!    then every planned rendition derived from it.
//! 4. **Archive**: replaced descriptors go into the backup registry.
//! 5. **Commit**: metadata and registry are persisted in one store write.
//!
//! Nothing is persisted before stage 5. A failure in stages 3 to 5 deletes
//! the files this save wrote, so the asset is left as it was.
//!
//! In overwrite mode the previous edited files are deleted after a
//! successful commit instead of being archived. Uploaded originals are never
//! deleted.

use crate::backup::{BackupEntry, BackupRegistry, FULL, Suffix, SuffixSource, SystemSuffix};
use crate::config::EditorConfig;
use crate::history::{EditOperation, FLIP_HORIZONTAL, FLIP_VERTICAL, OperationLog};
use crate::imaging::calculations::{
    aspect_ratio_matches, correct_crop, preview_dimensions, resize_dimensions,
};
use crate::imaging::{
    BackendError, CropRect, Dimensions, ImageBackend, ImageEditor, MimeType, Quality,
};
use crate::naming::{self, is_edited_full, is_edited_rendition, next_edited_path};
use crate::renditions::{RenditionPlanner, THUMBNAIL, Target};
use crate::store::{AttachmentStore, StoreError};
use crate::types::{AssetId, ImageMetadata, RenditionDescriptor};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Image data does not exist for asset {0}. Please re-import the image.")]
    NoImageData(AssetId),
    #[error("Unable to create new image: {0}")]
    InvalidEditorInstance(#[source] BackendError),
    #[error("Nothing to save, the image has not changed.")]
    NothingToSave,
    #[error(
        "Requested size {requested_width}x{requested_height} does not keep the \
         {width}x{height} aspect ratio"
    )]
    AspectRatioMismatch {
        width: u32,
        height: u32,
        requested_width: u32,
        requested_height: u32,
    },
    #[error("Error while saving the scaled image: {0}")]
    ScaleFailed(#[source] BackendError),
    #[error("Unable to apply the edit: {0}")]
    TransformFailed(#[source] BackendError),
    #[error("Unable to save the image: {0}")]
    SaveIo(#[source] BackendError),
    #[error("Cannot save image metadata: {0}")]
    MetadataInconsistent(#[source] StoreError),
    #[error("Cannot load image metadata: {0}")]
    Store(#[source] StoreError),
    #[error("Asset {0} is being edited elsewhere")]
    AssetBusy(AssetId),
}

impl EditError {
    /// Stable identifier for the caller-facing error response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoImageData(_) => "no_image_data",
            Self::InvalidEditorInstance(_) => "invalid_editor_instance",
            Self::NothingToSave => "nothing_to_save",
            Self::AspectRatioMismatch { .. } => "aspect_ratio_mismatch",
            Self::ScaleFailed(_) => "scale_failed",
            Self::TransformFailed(_) => "transform_failed",
            Self::SaveIo(_) => "save_io",
            Self::MetadataInconsistent(_) => "metadata_inconsistent",
            Self::Store(_) => "store",
            Self::AssetBusy(_) => "asset_busy",
        }
    }
}

fn store_error(err: StoreError) -> EditError {
    match err {
        StoreError::Busy(id) => EditError::AssetBusy(id),
        other => EditError::Store(other),
    }
}

/// What the caller asks to save.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub asset_id: AssetId,
    pub operations: Option<OperationLog>,
    pub target: Target,
    /// When set, overrides `target` with [`Target::DirectScale`].
    pub direct_scale: Option<(u32, u32)>,
}

impl EditRequest {
    pub fn new(asset_id: AssetId, operations: OperationLog, target: Target) -> Self {
        Self {
            asset_id,
            operations: Some(operations),
            target,
            direct_scale: None,
        }
    }

    pub fn scale(asset_id: AssetId, width: u32, height: u32) -> Self {
        Self {
            asset_id,
            operations: None,
            target: Target::All,
            direct_scale: Some((width, height)),
        }
    }

    pub fn resolved_target(&self) -> Target {
        match self.direct_scale {
            Some((width, height)) => Target::DirectScale { width, height },
            None => self.target,
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub full_width: u32,
    pub full_height: u32,
    /// Current full-size file, relative to the library root.
    pub file: PathBuf,
    /// Thumbnail to refresh in the caller, for targets that change it.
    pub thumbnail: Option<PathBuf>,
    /// Backup tags written by this save.
    pub archived: Vec<String>,
    /// Previous edited files removed in overwrite mode.
    pub purged: Vec<PathBuf>,
}

/// Apply operations in order to an editor, skipping net-zero entries.
///
/// Crop rectangles are in preview pixels and are scaled against the image
/// size at the point the crop is reached.
pub fn apply_operations<E: ImageEditor>(
    editor: &mut E,
    log: &OperationLog,
    preview_max: u32,
) -> Result<(), BackendError> {
    for op in log.effective() {
        match *op {
            EditOperation::Rotate { angle } => editor.rotate(angle)?,
            EditOperation::Flip { axis } => {
                editor.flip(axis & FLIP_HORIZONTAL != 0, axis & FLIP_VERTICAL != 0)?
            }
            EditOperation::Crop { x, y, w, h } => {
                let rect = correct_crop(
                    CropRect { x, y, w, h },
                    editor.get_size().as_tuple(),
                    preview_max,
                );
                editor.crop(rect.x, rect.y, rect.w, rect.h)?;
            }
        }
    }
    Ok(())
}

/// Best-effort removal of files written by a failed or finished save.
pub(crate) fn discard_files<S: AttachmentStore>(store: &S, files: &[PathBuf]) {
    for file in files {
        match store.delete_file(file) {
            Ok(()) => debug!(file = %file.display(), "removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %file.display(), error = %e, "cleanup failed"),
        }
    }
}

/// Resize a copy of `editor` into a rendition saved next to `source_file`.
///
/// Returns `None` when the image is already within the box. The rendition's
/// path is pushed onto `written` before saving so callers can clean up.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_rendition<E: ImageEditor, S: AttachmentStore>(
    store: &S,
    editor: &E,
    width: u32,
    height: u32,
    crop: bool,
    source_file: &Path,
    mime: MimeType,
    quality: Quality,
    written: &mut Vec<PathBuf>,
) -> Result<Option<RenditionDescriptor>, BackendError> {
    if resize_dimensions(editor.get_size().as_tuple(), (width, height), crop).is_none() {
        return Ok(None);
    }
    let mut rendition = editor.clone();
    rendition.resize(width, height, crop)?;
    let Dimensions { width, height } = rendition.get_size();
    let file = naming::rendition_file_name(source_file, width, height);
    let path = source_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&file);
    written.push(path.clone());
    rendition.save(&store.resolve(&path), mime, quality)?;
    Ok(Some(RenditionDescriptor {
        file,
        width,
        height,
    }))
}

/// Whether the asset already records a file from the version `candidate`
/// would start, either as its full size or derived from it.
///
/// Thumbnail-only saves remove their full-size file, so probing the disk for
/// `candidate` alone does not see the version.
fn references_version(meta: &ImageMetadata, registry: &BackupRegistry, candidate: &Path) -> bool {
    let Some(stem) = candidate.file_stem().map(|s| s.to_string_lossy()) else {
        return false;
    };
    let full = naming::basename(candidate);
    let rendition_prefix = format!("{}-", stem);
    let taken = |file: &str| file == full || file.starts_with(&rendition_prefix);
    taken(&meta.basename())
        || meta.sizes.values().any(|d| taken(&d.file))
        || registry.iter().any(|(_, entry)| taken(&entry.file))
}

/// Saves edits against one store and backend.
pub struct EditPipeline<'a, B: ImageBackend, S: AttachmentStore> {
    backend: &'a B,
    store: &'a S,
    config: &'a EditorConfig,
    suffixes: &'a dyn SuffixSource,
}

impl<'a, B: ImageBackend, S: AttachmentStore> EditPipeline<'a, B, S> {
    pub fn new(backend: &'a B, store: &'a S, config: &'a EditorConfig) -> Self {
        Self {
            backend,
            store,
            config,
            suffixes: &SystemSuffix,
        }
    }

    pub fn with_suffixes(mut self, suffixes: &'a dyn SuffixSource) -> Self {
        self.suffixes = suffixes;
        self
    }

    fn load(&self, id: &AssetId) -> Result<(ImageMetadata, MimeType, B::Editor), EditError> {
        let meta = self
            .store
            .load_metadata(id)
            .map_err(store_error)?
            .filter(ImageMetadata::has_dimensions)
            .ok_or_else(|| EditError::NoImageData(id.clone()))?;
        let mime = MimeType::from_path(&meta.file).ok_or_else(|| {
            EditError::InvalidEditorInstance(BackendError::UnsupportedFormat(
                meta.file.display().to_string(),
            ))
        })?;
        let editor = self
            .backend
            .open(&self.store.resolve(&meta.file))
            .map_err(EditError::InvalidEditorInstance)?;
        Ok((meta, mime, editor))
    }

    /// Apply a request and persist the new version.
    #[tracing::instrument(
        skip(self, request),
        fields(asset = %request.asset_id, target = %request.resolved_target())
    )]
    pub fn apply(&self, request: &EditRequest) -> Result<SaveSummary, EditError> {
        let id = &request.asset_id;
        let _lock = self
            .store
            .lock(id, self.config.lock_timeout())
            .map_err(store_error)?;

        let (meta, mime, mut editor) = self.load(id)?;
        let target = request.resolved_target();

        match target {
            Target::DirectScale { width, height } => {
                let size = editor.get_size();
                if width == 0 || height == 0 || !aspect_ratio_matches(size.as_tuple(), (width, height))
                {
                    return Err(EditError::AspectRatioMismatch {
                        width: size.width,
                        height: size.height,
                        requested_width: width,
                        requested_height: height,
                    });
                }
                editor
                    .resize(width, height, false)
                    .map_err(EditError::ScaleFailed)?;
            }
            _ => {
                let log = request
                    .operations
                    .as_ref()
                    .map(OperationLog::canonicalize)
                    .filter(|log| !log.is_empty())
                    .ok_or(EditError::NothingToSave)?;
                debug!(operations = %log.to_json(), "applying canonical history");
                apply_operations(&mut editor, &log, self.config.preview_max)
                    .map_err(EditError::TransformFailed)?;
            }
        }

        let mut registry = match self.store.load_backup_registry(id) {
            Ok(r) => r,
            Err(StoreError::Malformed { source, .. }) => {
                warn!(error = %source, "backup registry unreadable, starting a new one");
                BackupRegistry::new()
            }
            Err(e) => return Err(store_error(e)),
        };

        let plan = RenditionPlanner::new(&self.config.sizes).plan(target);
        let source_size = editor.get_size().as_tuple();
        let seed = self.suffixes.seed();
        let (new_file, suffix) = next_edited_path(&meta.file, seed.value(), |candidate| {
            self.store.file_exists(candidate)
                || references_version(&meta, &registry, candidate)
                || plan.renditions.iter().any(|planned| {
                    resize_dimensions(
                        source_size,
                        (planned.spec.width, planned.spec.height),
                        planned.crop(),
                    )
                    .is_some_and(|(w, h)| {
                        let file = naming::rendition_file_name(candidate, w, h);
                        self.store.file_exists(&meta.sibling(&file))
                    })
                })
        });
        let suffix = Suffix::new(suffix);
        let quality = self.config.quality();

        if let Err(e) = editor.save(&self.store.resolve(&new_file), mime, quality) {
            discard_files(self.store, std::slice::from_ref(&new_file));
            return Err(EditError::SaveIo(e));
        }
        let mut written = vec![new_file.clone()];

        let overwrite = self.config.overwrite;
        let mut new_meta = meta.clone();
        let mut archived = Vec::new();

        if plan.replace_full {
            let current = BackupEntry {
                width: meta.width,
                height: meta.height,
                file: meta.basename(),
            };
            archived.extend(registry.archive_if_needed(FULL, &current, overwrite, suffix));
            let size = editor.get_size();
            new_meta.file = new_file.clone();
            new_meta.width = size.width;
            new_meta.height = size.height;
        }

        for planned in &plan.renditions {
            let name = planned.spec.name.as_str();
            match write_rendition(
                self.store,
                &editor,
                planned.spec.width,
                planned.spec.height,
                planned.crop(),
                &new_file,
                mime,
                quality,
                &mut written,
            ) {
                Ok(Some(descriptor)) => {
                    if let Some(current) = meta.sizes.get(name) {
                        archived.extend(registry.archive_if_needed(
                            name,
                            &current.clone().into(),
                            overwrite,
                            suffix,
                        ));
                    }
                    new_meta.sizes.insert(name.to_string(), descriptor);
                }
                Ok(None) => debug!(size = name, "source too small, rendition kept as is"),
                Err(e) => {
                    discard_files(self.store, &written);
                    return Err(EditError::SaveIo(e));
                }
            }
        }

        for tag in &archived {
            debug!(tag = %tag, "archived");
        }

        if let Err(e) = self.store.commit(id, &new_meta, &registry) {
            discard_files(self.store, &written);
            return Err(EditError::MetadataInconsistent(e));
        }

        if !plan.replace_full {
            // The full-size file only fed the renditions.
            discard_files(self.store, std::slice::from_ref(&new_file));
        }

        let purged = if overwrite {
            self.purge_replaced(&meta, &new_meta, &registry)
        } else {
            Vec::new()
        };

        let thumbnail = match target {
            Target::All | Target::Full | Target::Thumbnail => Some(
                new_meta
                    .sizes
                    .get(THUMBNAIL)
                    .map(|t| new_meta.sibling(&t.file))
                    .unwrap_or_else(|| new_meta.file.clone()),
            ),
            _ => None,
        };

        info!(
            file = %new_meta.file.display(),
            width = new_meta.width,
            height = new_meta.height,
            "image saved"
        );
        Ok(SaveSummary {
            full_width: new_meta.width,
            full_height: new_meta.height,
            file: new_meta.file,
            thumbnail,
            archived,
            purged,
        })
    }

    /// Delete edited files that this save replaced and nothing references.
    fn purge_replaced(
        &self,
        old: &ImageMetadata,
        new: &ImageMetadata,
        registry: &BackupRegistry,
    ) -> Vec<PathBuf> {
        let mut doomed = Vec::new();

        let old_full = old.basename();
        if old.file != new.file
            && is_edited_full(&old_full)
            && !registry.references_file(FULL, &old_full)
        {
            doomed.push(old.file.clone());
        }

        for (name, descriptor) in &old.sizes {
            let replaced = new
                .sizes
                .get(name)
                .is_some_and(|current| current.file != descriptor.file);
            if replaced
                && is_edited_rendition(&descriptor.file)
                && !registry.references_file(name, &descriptor.file)
            {
                doomed.push(old.sibling(&descriptor.file));
            }
        }

        for file in &doomed {
            debug!(file = %file.display(), "overwrite mode, discarding previous edit");
        }
        discard_files(self.store, &doomed);
        doomed
    }

    /// Render the history onto a preview-sized copy of the current image.
    ///
    /// Nothing about the asset changes.
    #[tracing::instrument(skip(self, id, log, output), fields(asset = %id))]
    pub fn preview(
        &self,
        id: &AssetId,
        log: &OperationLog,
        output: &Path,
    ) -> Result<Dimensions, EditError> {
        let (_meta, mime, mut editor) = self.load(id)?;
        apply_operations(&mut editor, &log.canonicalize(), self.config.preview_max)
            .map_err(EditError::TransformFailed)?;

        let size = editor.get_size();
        let (width, height) = preview_dimensions(size.as_tuple(), self.config.preview_max);
        if (width, height) != size.as_tuple() {
            editor
                .resize(width, height, false)
                .map_err(EditError::TransformFailed)?;
        }

        let out_mime = MimeType::from_path(output).unwrap_or(mime);
        editor
            .save(output, out_mime, self.config.quality())
            .map_err(EditError::SaveIo)?;
        Ok(editor.get_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::FixedSuffix;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp, write_mock_image};
    use crate::renditions::RenditionSpec;
    use crate::store::tests::MemoryStore;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const SEED: u64 = 1_700_000_000_123;

    fn config() -> EditorConfig {
        EditorConfig {
            sizes: vec![
                RenditionSpec::new("thumbnail", 150, 150, true),
                RenditionSpec::new("medium", 300, 300, false),
            ],
            ..EditorConfig::default()
        }
    }

    fn asset() -> AssetId {
        AssetId::new("beach").unwrap()
    }

    /// A 2000x1000 upload with thumbnail and medium renditions.
    fn setup(tmp: &TempDir) -> MemoryStore {
        let dir = tmp.path().join("2024");
        write_mock_image(&dir.join("beach.jpg"), 2000, 1000);
        write_mock_image(&dir.join("beach-150x150.jpg"), 150, 150);
        write_mock_image(&dir.join("beach-300x150.jpg"), 300, 150);

        let mut sizes = BTreeMap::new();
        sizes.insert(
            "thumbnail".to_string(),
            RenditionDescriptor {
                file: "beach-150x150.jpg".into(),
                width: 150,
                height: 150,
            },
        );
        sizes.insert(
            "medium".to_string(),
            RenditionDescriptor {
                file: "beach-300x150.jpg".into(),
                width: 300,
                height: 150,
            },
        );
        let store = MemoryStore::new(tmp.path());
        store.insert(
            &asset(),
            ImageMetadata {
                file: PathBuf::from("2024/beach.jpg"),
                width: 2000,
                height: 1000,
                sizes,
            },
            BackupRegistry::new(),
        );
        store
    }

    fn rotate(angle: i32) -> OperationLog {
        OperationLog::new(vec![EditOperation::Rotate { angle }])
    }

    fn run(
        backend: &MockBackend,
        store: &MemoryStore,
        config: &EditorConfig,
        request: EditRequest,
    ) -> Result<SaveSummary, EditError> {
        let seed = FixedSuffix(SEED);
        EditPipeline::new(backend, store, config)
            .with_suffixes(&seed)
            .apply(&request)
    }

    // =========================================================================
    // Targets
    // =========================================================================

    #[test]
    fn rotate_all_writes_new_version_and_archives_originals() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let summary = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap();

        assert_eq!((summary.full_width, summary.full_height), (1000, 2000));
        assert_eq!(summary.file, PathBuf::from("2024/beach-e1700000000123.jpg"));
        assert_eq!(
            summary.thumbnail,
            Some(PathBuf::from("2024/beach-e1700000000123-150x150.jpg"))
        );

        let meta = store.metadata(&asset()).unwrap();
        assert_eq!(meta.file, summary.file);
        assert_eq!(meta.sizes["medium"].file, "beach-e1700000000123-150x300.jpg");
        assert!(tmp.path().join("2024/beach-e1700000000123.jpg").exists());
        assert!(tmp.path().join("2024/beach-e1700000000123-150x150.jpg").exists());

        let registry = store.registry(&asset());
        assert_eq!(registry.get("full-orig").unwrap().file, "beach.jpg");
        assert_eq!(registry.get("thumbnail-orig").unwrap().file, "beach-150x150.jpg");
        assert_eq!(registry.get("medium-orig").unwrap().file, "beach-300x150.jpg");
        assert_eq!(registry.len(), 3);
        // The upload stays on disk.
        assert!(tmp.path().join("2024/beach.jpg").exists());
    }

    #[test]
    fn thumbnail_target_only_touches_thumbnail() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let summary = run(
            &backend,
            &store,
            &config(),
            EditRequest::new(asset(), rotate(90), Target::Thumbnail),
        )
        .unwrap();

        let meta = store.metadata(&asset()).unwrap();
        assert_eq!(meta.file, PathBuf::from("2024/beach.jpg"));
        assert_eq!((meta.width, meta.height), (2000, 1000));
        assert_eq!((summary.full_width, summary.full_height), (2000, 1000));
        // Never cropped: 1000x2000 fitted into 150x150.
        assert_eq!(meta.sizes["thumbnail"].file, "beach-e1700000000123-75x150.jpg");
        assert_eq!(meta.sizes["medium"].file, "beach-300x150.jpg");

        let registry = store.registry(&asset());
        assert!(registry.get("thumbnail-orig").is_some());
        assert!(registry.get("full-orig").is_none());
        assert!(registry.get("medium-orig").is_none());

        // The edited full-size file only fed the thumbnail.
        assert!(!tmp.path().join("2024/beach-e1700000000123.jpg").exists());
        assert!(tmp.path().join("2024/beach-e1700000000123-75x150.jpg").exists());
        assert!(backend.get_operations().contains(&RecordedOp::Resize {
            width: 150,
            height: 150,
            crop: false
        }));
    }

    #[test]
    fn repeated_thumbnail_saves_keep_the_previous_thumbnail() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let flip = OperationLog::new(vec![EditOperation::Flip {
            axis: FLIP_HORIZONTAL,
        }]);

        run(&backend, &store, &config(), EditRequest::new(asset(), flip, Target::Thumbnail))
            .unwrap();
        let first = store.metadata(&asset()).unwrap().sizes["thumbnail"].file.clone();
        run(
            &backend,
            &store,
            &config(),
            EditRequest::new(asset(), rotate(180), Target::Thumbnail),
        )
        .unwrap();
        let second = store.metadata(&asset()).unwrap().sizes["thumbnail"].file.clone();

        assert_eq!(first, "beach-e1700000000123-150x75.jpg");
        assert_eq!(second, "beach-e1700000000124-150x75.jpg");
        assert!(tmp.path().join("2024").join(&first).exists());
        assert_eq!(
            store.registry(&asset()).get("thumbnail-1700000000124").unwrap().file,
            first
        );
        let rendition_saves: Vec<String> = backend
            .saved_paths()
            .into_iter()
            .filter(|p| p.ends_with("-150x75.jpg"))
            .collect();
        assert_eq!(rendition_saves.len(), 2);
        assert_ne!(rendition_saves[0], rendition_saves[1]);
    }

    #[test]
    fn skipped_rendition_is_not_archived() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        // 250x250 after correction already fits the 300x300 medium box.
        let log = OperationLog::new(vec![EditOperation::Crop {
            x: 10.0,
            y: 10.0,
            w: 50.0,
            h: 50.0,
        }]);

        let summary =
            run(&backend, &store, &config(), EditRequest::new(asset(), log, Target::All)).unwrap();

        let meta = store.metadata(&asset()).unwrap();
        assert_eq!(meta.sizes["medium"].file, "beach-300x150.jpg");
        let registry = store.registry(&asset());
        assert!(registry.get("medium-orig").is_none());
        assert!(registry.get("thumbnail-orig").is_some());
        assert!(!summary.archived.iter().any(|tag| tag.starts_with("medium")));
    }

    #[test]
    fn full_target_leaves_renditions() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let summary =
            run(&backend, &store, &config(), EditRequest::new(asset(), rotate(180), Target::Full))
                .unwrap();

        let meta = store.metadata(&asset()).unwrap();
        assert_eq!(meta.sizes["thumbnail"].file, "beach-150x150.jpg");
        // No thumbnail rendition was regenerated, so the tag only covers full size.
        assert_eq!(summary.archived, vec!["full-orig".to_string()]);
        assert_eq!(
            summary.thumbnail,
            Some(PathBuf::from("2024/beach-150x150.jpg"))
        );
    }

    #[test]
    fn nothumb_target_keeps_thumbnail_and_reports_none() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let summary = run(
            &backend,
            &store,
            &config(),
            EditRequest::new(asset(), rotate(90), Target::NoThumb),
        )
        .unwrap();

        let meta = store.metadata(&asset()).unwrap();
        assert_eq!(meta.sizes["thumbnail"].file, "beach-150x150.jpg");
        assert_eq!(meta.sizes["medium"].file, "beach-e1700000000123-150x300.jpg");
        assert_eq!(summary.thumbnail, None);
    }

    // =========================================================================
    // Operation log handling
    // =========================================================================

    #[test]
    fn empty_history_is_nothing_to_save() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let empty = EditRequest::new(asset(), OperationLog::default(), Target::All);
        assert!(matches!(
            run(&backend, &store, &config(), empty),
            Err(EditError::NothingToSave)
        ));

        let missing = EditRequest {
            operations: None,
            ..EditRequest::new(asset(), OperationLog::default(), Target::All)
        };
        let err = run(&backend, &store, &config(), missing).unwrap_err();
        assert_eq!(err.kind(), "nothing_to_save");
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn crop_is_scaled_from_preview_to_full_resolution() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let log = OperationLog::new(vec![EditOperation::Crop {
            x: 10.0,
            y: 10.0,
            w: 50.0,
            h: 50.0,
        }]);

        run(&backend, &store, &config(), EditRequest::new(asset(), log, Target::Full)).unwrap();

        assert!(backend.edits().contains(&RecordedOp::Crop {
            x: 50.0,
            y: 50.0,
            w: 250.0,
            h: 250.0
        }));
        let meta = store.metadata(&asset()).unwrap();
        assert_eq!((meta.width, meta.height), (250, 250));
    }

    #[test]
    fn cancelling_flips_apply_nothing_but_still_save() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let log = OperationLog::new(vec![
            EditOperation::Flip { axis: FLIP_HORIZONTAL },
            EditOperation::Flip { axis: FLIP_HORIZONTAL },
        ]);

        let summary =
            run(&backend, &store, &config(), EditRequest::new(asset(), log, Target::Full)).unwrap();

        assert!(
            !backend
                .edits()
                .iter()
                .any(|op| matches!(op, RecordedOp::Flip { .. }))
        );
        assert_eq!(summary.file, PathBuf::from("2024/beach-e1700000000123.jpg"));
    }

    #[test]
    fn flip_axis_bits_map_to_editor_flags() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let log = OperationLog::new(vec![EditOperation::Flip { axis: FLIP_VERTICAL }]);

        run(&backend, &store, &config(), EditRequest::new(asset(), log, Target::Full)).unwrap();

        assert_eq!(
            backend.edits()[0],
            RecordedOp::Flip {
                horizontal: false,
                vertical: true
            }
        );
    }

    // =========================================================================
    // Direct scale
    // =========================================================================

    #[test]
    fn direct_scale_within_tolerance_resizes_full_only() {
        let tmp = TempDir::new().unwrap();
        write_mock_image(&tmp.path().join("wide.png"), 1600, 900);
        let store = MemoryStore::new(tmp.path());
        let id = AssetId::new("wide").unwrap();
        store.insert(
            &id,
            ImageMetadata {
                file: PathBuf::from("wide.png"),
                width: 1600,
                height: 900,
                sizes: BTreeMap::new(),
            },
            BackupRegistry::new(),
        );
        let backend = MockBackend::new();

        let summary = run(&backend, &store, &config(), EditRequest::scale(id.clone(), 800, 450)).unwrap();

        assert_eq!((summary.full_width, summary.full_height), (800, 450));
        assert_eq!(summary.thumbnail, None);
        assert_eq!(store.registry(&id).get("full-orig").unwrap().width, 1600);
        assert!(store.metadata(&id).unwrap().sizes.is_empty());
    }

    #[test]
    fn direct_scale_outside_tolerance_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write_mock_image(&tmp.path().join("wide.png"), 1600, 900);
        let store = MemoryStore::new(tmp.path());
        let id = AssetId::new("wide").unwrap();
        store.insert(
            &id,
            ImageMetadata {
                file: PathBuf::from("wide.png"),
                width: 1600,
                height: 900,
                sizes: BTreeMap::new(),
            },
            BackupRegistry::new(),
        );
        let backend = MockBackend::new();

        let err = run(&backend, &store, &config(), EditRequest::scale(id.clone(), 800, 600)).unwrap_err();
        assert!(matches!(err, EditError::AspectRatioMismatch { .. }));
        assert_eq!(err.kind(), "aspect_ratio_mismatch");
        assert!(backend.saved_paths().is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn direct_scale_upwards_fails() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let err = run(&backend, &store, &config(), EditRequest::scale(asset(), 4000, 2000)).unwrap_err();
        assert_eq!(err.kind(), "scale_failed");
    }

    // =========================================================================
    // Failure handling
    // =========================================================================

    #[test]
    fn missing_metadata_is_no_image_data() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryStore::new(tmp.path());
        let backend = MockBackend::new();
        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();
        assert!(matches!(err, EditError::NoImageData(_)));
    }

    #[test]
    fn zero_dimensions_are_no_image_data() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let mut meta = store.metadata(&asset()).unwrap();
        meta.height = 0;
        store.insert(&asset(), meta, BackupRegistry::new());
        let backend = MockBackend::new();
        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();
        assert_eq!(err.kind(), "no_image_data");
    }

    #[test]
    fn unopenable_image_is_invalid_editor_instance() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::failing_open();
        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_editor_instance");
    }

    #[test]
    fn full_save_failure_mutates_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let before = store.metadata(&asset());
        let backend = MockBackend::new();
        backend.fail_saves_matching("beach-e17");

        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();

        assert!(matches!(err, EditError::SaveIo(_)));
        assert_eq!(store.metadata(&asset()), before);
        assert!(store.registry(&asset()).is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn rendition_save_failure_removes_written_files() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        backend.fail_saves_matching("-150x300");

        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();

        assert_eq!(err.kind(), "save_io");
        assert!(!tmp.path().join("2024/beach-e1700000000123.jpg").exists());
        assert!(!tmp.path().join("2024/beach-e1700000000123-150x150.jpg").exists());
        assert!(store.registry(&asset()).is_empty());
    }

    #[test]
    fn commit_failure_is_metadata_inconsistent_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        store.fail_commits();
        let backend = MockBackend::new();

        let err = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap_err();

        assert_eq!(err.kind(), "metadata_inconsistent");
        assert!(!tmp.path().join("2024/beach-e1700000000123.jpg").exists());
        assert!(!tmp.path().join("2024/beach-e1700000000123-150x150.jpg").exists());
        assert!(tmp.path().join("2024/beach.jpg").exists());
    }

    #[test]
    fn malformed_registry_starts_fresh() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        store.corrupt_registry(&asset());
        let backend = MockBackend::new();

        run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::Full)).unwrap();

        assert_eq!(store.registry(&asset()).get("full-orig").unwrap().file, "beach.jpg");
    }

    // =========================================================================
    // Versioning
    // =========================================================================

    #[test]
    fn same_second_saves_never_collide() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();

        let first = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap();
        let second = run(&backend, &store, &config(), EditRequest::new(asset(), rotate(90), Target::All))
            .unwrap();

        assert_eq!(first.file, PathBuf::from("2024/beach-e1700000000123.jpg"));
        assert_eq!(second.file, PathBuf::from("2024/beach-e1700000000124.jpg"));
        assert!(tmp.path().join(&first.file).exists());
        assert!(tmp.path().join(&second.file).exists());

        // The first edit is archived under the suffix of the second save.
        let registry = store.registry(&asset());
        assert_eq!(
            registry.get("full-1700000000124").unwrap().file,
            "beach-e1700000000123.jpg"
        );
        assert_eq!(
            registry.get("thumbnail-1700000000124").unwrap().file,
            "beach-e1700000000123-150x150.jpg"
        );
        assert_eq!(registry.get("full-orig").unwrap().file, "beach.jpg");
    }

    #[test]
    fn overwrite_mode_discards_previous_edit() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let config = EditorConfig {
            overwrite: true,
            ..config()
        };

        run(&backend, &store, &config, EditRequest::new(asset(), rotate(90), Target::All)).unwrap();
        let second =
            run(&backend, &store, &config, EditRequest::new(asset(), rotate(90), Target::All)).unwrap();

        assert_eq!(
            second.purged,
            vec![
                PathBuf::from("2024/beach-e1700000000123.jpg"),
                PathBuf::from("2024/beach-e1700000000123-150x300.jpg"),
                PathBuf::from("2024/beach-e1700000000123-150x150.jpg"),
            ]
        );
        assert!(!tmp.path().join("2024/beach-e1700000000123.jpg").exists());
        assert!(tmp.path().join("2024/beach.jpg").exists());
        assert!(tmp.path().join("2024/beach-150x150.jpg").exists());
        // Only the originals are archived.
        assert_eq!(store.registry(&asset()).len(), 3);
    }

    // =========================================================================
    // Preview
    // =========================================================================

    #[test]
    fn preview_is_scaled_and_does_not_touch_the_asset() {
        let tmp = TempDir::new().unwrap();
        let store = setup(&tmp);
        let backend = MockBackend::new();
        let out = tmp.path().join("preview.png");

        let dims = EditPipeline::new(&backend, &store, &config())
            .preview(&asset(), &rotate(90), &out)
            .unwrap();

        assert_eq!(dims, Dimensions::from((200, 400)));
        assert!(out.exists());
        assert_eq!(store.commit_count(), 0);
        assert!(store.registry(&asset()).is_empty());
    }
}
