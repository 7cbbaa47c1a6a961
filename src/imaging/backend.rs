//! Image processing backend traits and shared types.
//!
//! Pixel work is split in two:
//!
//! - [`ImageBackend`] opens a file and hands back an editor. Opening is where
//!   format support is decided; a failure here means the asset cannot be edited
//!   at all.
//! - [`ImageEditor`] is an in-memory image that the pipelines rotate, flip,
//!   crop, resize and save. Editors are `Clone` so each rendition can be
//!   derived from the same edited full-size image without re-decoding it.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::{MimeType, Quality};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Opens images for editing.
pub trait ImageBackend: Sync {
    type Editor: ImageEditor;

    /// Decode the image at `path` into an editor.
    fn open(&self, path: &Path) -> Result<Self::Editor, BackendError>;
}

/// An image loaded in memory.
///
/// Angles are degrees, positive = counter-clockwise. `flip(horizontal, _)`
/// mirrors across the horizontal axis (top and bottom swap); `vertical`
/// mirrors across the vertical axis.
pub trait ImageEditor: Clone {
    fn rotate(&mut self, angle: i32) -> Result<(), BackendError>;

    fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), BackendError>;

    /// Crop to a rectangle in the image's own pixel space.
    fn crop(&mut self, x: f64, y: f64, w: f64, h: f64) -> Result<(), BackendError>;

    /// Resize towards a `width × height` box. With `crop`, the result is
    /// exactly the box (fill then centre crop); without, it fits inside.
    fn resize(&mut self, width: u32, height: u32, crop: bool) -> Result<(), BackendError>;

    fn get_size(&self) -> Dimensions;

    fn save(&self, path: &Path, mime: MimeType, quality: Quality) -> Result<(), BackendError>;
}
