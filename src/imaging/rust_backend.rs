//! Pure Rust image backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::ImageReader` with format guessing |
//! | Rotate (quarter turns) | `DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | Flip | `DynamicImage::flipv` / `fliph` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize (fit) | `DynamicImage::resize_exact` with `Lanczos3` on pre-computed dimensions |
//! | Resize (crop) | `DynamicImage::resize_to_fill` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode PNG / GIF / WebP | `DynamicImage::save_with_format` (WebP is lossless) |
//!
//! Only multiples of 90° can be rotated; the editor UI never produces anything else.

use super::backend::{BackendError, Dimensions, ImageBackend, ImageEditor};
use super::calculations::resize_dimensions;
use super::params::{MimeType, Quality};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded image held in memory.
#[derive(Clone)]
pub struct RustEditor {
    image: DynamicImage,
}

impl RustEditor {
    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl ImageBackend for RustBackend {
    type Editor = RustEditor;

    fn open(&self, path: &Path) -> Result<RustEditor, BackendError> {
        if MimeType::from_path(path).is_none() {
            return Err(BackendError::UnsupportedFormat(path.display().to_string()));
        }
        let image = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(RustEditor { image })
    }
}

fn image_format(mime: MimeType) -> ImageFormat {
    match mime {
        MimeType::Jpeg => ImageFormat::Jpeg,
        MimeType::Png => ImageFormat::Png,
        MimeType::Gif => ImageFormat::Gif,
        MimeType::WebP => ImageFormat::WebP,
    }
}

/// Encode as JPEG. JPEG has no alpha channel, so the image is flattened to RGB8.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value() as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageEditor for RustEditor {
    fn rotate(&mut self, angle: i32) -> Result<(), BackendError> {
        self.image = match angle.rem_euclid(360) {
            0 => return Ok(()),
            // counter-clockwise quarter turn
            90 => self.image.rotate270(),
            180 => self.image.rotate180(),
            270 => self.image.rotate90(),
            other => {
                return Err(BackendError::ProcessingFailed(format!(
                    "Unsupported rotation angle: {}",
                    other
                )));
            }
        };
        Ok(())
    }

    fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), BackendError> {
        if horizontal {
            self.image = self.image.flipv();
        }
        if vertical {
            self.image = self.image.fliph();
        }
        Ok(())
    }

    fn crop(&mut self, x: f64, y: f64, w: f64, h: f64) -> Result<(), BackendError> {
        // Fractional pixels are truncated, negative offsets clamp to the edge.
        let (x, y) = (x.max(0.0) as u32, y.max(0.0) as u32);
        let (w, h) = (w.max(0.0) as u32, h.max(0.0) as u32);
        if w == 0 || h == 0 || x >= self.image.width() || y >= self.image.height() {
            return Err(BackendError::ProcessingFailed(format!(
                "Crop {}x{}+{}+{} is outside the {}x{} image",
                w,
                h,
                x,
                y,
                self.image.width(),
                self.image.height()
            )));
        }
        self.image = self.image.crop_imm(x, y, w, h);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, crop: bool) -> Result<(), BackendError> {
        let current = (self.image.width(), self.image.height());
        let (new_w, new_h) = resize_dimensions(current, (width, height), crop).ok_or_else(|| {
            BackendError::ProcessingFailed(format!(
                "Could not calculate resized dimensions for {}x{} into {}x{}",
                current.0, current.1, width, height
            ))
        })?;
        self.image = if crop {
            self.image.resize_to_fill(new_w, new_h, FilterType::Lanczos3)
        } else {
            self.image.resize_exact(new_w, new_h, FilterType::Lanczos3)
        };
        Ok(())
    }

    fn get_size(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn save(&self, path: &Path, mime: MimeType, quality: Quality) -> Result<(), BackendError> {
        match mime {
            MimeType::Jpeg => save_jpeg(&self.image, path, quality),
            other => self
                .image
                .save_with_format(path, image_format(other))
                .map_err(|e| match e {
                    image::ImageError::IoError(io) => BackendError::Io(io),
                    e => BackendError::ProcessingFailed(format!("{} encode failed: {}", other, e)),
                }),
        }
    }
}
