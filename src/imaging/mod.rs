//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Rotate / flip / crop** | `image::DynamicImage` transforms |
//! | **Resize** | Lanczos3, fit or fill-and-crop |
//! | **Encode** | JPEG (with quality), PNG, GIF, lossless WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for preview scaling and dimension math (unit testable)
//! - **Parameters**: Encoding quality and output format
//! - **Backend**: [`ImageBackend`] / [`ImageEditor`] traits + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, ImageEditor};
pub use calculations::{CropRect, DEFAULT_PREVIEW_MAX};
pub use params::{MimeType, Quality};
pub use rust_backend::{RustBackend, RustEditor};
