//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Longest edge, in pixels, of the preview the editing UI works against.
pub const DEFAULT_PREVIEW_MAX: u32 = 400;

/// Half-open tolerance band for direct-scale aspect ratio checks.
const ASPECT_TOLERANCE: f64 = 0.1;

/// A crop selection. Units depend on context: preview pixels as submitted by
/// the editor, full-resolution pixels after [`correct_crop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CropRect {
    fn scaled(self, scale: f64) -> Self {
        Self {
            x: self.x * scale,
            y: self.y * scale,
            w: self.w * scale,
            h: self.h * scale,
        }
    }
}

/// Ratio between the editing preview and the full-resolution image.
///
/// Images whose longest edge exceeds `preview_max` are shown scaled down so
/// that edge equals `preview_max`; smaller images are shown at 1:1.
///
/// ```text
/// 2000x1000, max 400 → 0.2
///  300x200,  max 400 → 1.0
/// ```
pub fn preview_ratio(dims: (u32, u32), preview_max: u32) -> f64 {
    let longest = dims.0.max(dims.1);
    if longest > preview_max {
        preview_max as f64 / longest as f64
    } else {
        1.0
    }
}

/// Map a crop selection made on the preview onto the full-resolution grid.
///
/// `dims` are the dimensions of the image being cropped at the moment the crop
/// is applied, which is the same image the preview was rendered from.
pub fn correct_crop(rect: CropRect, dims: (u32, u32), preview_max: u32) -> CropRect {
    rect.scaled(1.0 / preview_ratio(dims, preview_max))
}

/// Preview dimensions for an image: scaled by [`preview_ratio`], never below 1px.
pub fn preview_dimensions(dims: (u32, u32), preview_max: u32) -> (u32, u32) {
    let ratio = preview_ratio(dims, preview_max);
    let w = ((dims.0 as f64 * ratio) as u32).max(1);
    let h = ((dims.1 as f64 * ratio) as u32).max(1);
    (w, h)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Check whether a requested direct-scale size keeps roughly the source's
/// aspect ratio: both ratios rounded to two decimals must differ by less
/// than 0.1.
pub fn aspect_ratio_matches(source: (u32, u32), requested: (u32, u32)) -> bool {
    if source.1 == 0 || requested.1 == 0 {
        return false;
    }
    let diff = round2(source.0 as f64 / source.1 as f64)
        - round2(requested.0 as f64 / requested.1 as f64);
    -ASPECT_TOLERANCE < diff && diff < ASPECT_TOLERANCE
}

/// Fit `current` inside a `max` bounding box preserving aspect ratio.
///
/// A zero bound is unconstrained. Never upscales; each side is at least 1px.
pub fn constrain_dimensions(current: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (cur_w, cur_h) = current;
    let (max_w, max_h) = max;

    let mut ratio: f64 = 1.0;
    if max_w > 0 && cur_w > max_w {
        ratio = ratio.min(max_w as f64 / cur_w as f64);
    }
    if max_h > 0 && cur_h > max_h {
        ratio = ratio.min(max_h as f64 / cur_h as f64);
    }

    let w = ((cur_w as f64 * ratio).round() as u32).max(1);
    let h = ((cur_h as f64 * ratio).round() as u32).max(1);
    (w, h)
}

/// Output dimensions for resizing `source` towards a `dest` box.
///
/// - `crop = false`: fit inside the box (see [`constrain_dimensions`]).
/// - `crop = true`: exactly `dest`, each side capped at the source size; a
///   zero side follows the source aspect ratio.
///
/// Returns `None` when the result would not be smaller than the source on
/// either side, meaning there is nothing to generate.
pub fn resize_dimensions(source: (u32, u32), dest: (u32, u32), crop: bool) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let (dest_w, dest_h) = dest;
    if src_w == 0 || src_h == 0 || (dest_w == 0 && dest_h == 0) {
        return None;
    }

    let (new_w, new_h) = if crop {
        let aspect = src_w as f64 / src_h as f64;
        let mut w = dest_w.min(src_w);
        let mut h = dest_h.min(src_h);
        if w == 0 {
            w = ((h as f64 * aspect) as u32).max(1);
        }
        if h == 0 {
            h = ((w as f64 / aspect) as u32).max(1);
        }
        (w, h)
    } else {
        constrain_dimensions(source, dest)
    };

    if new_w >= src_w && new_h >= src_h {
        return None;
    }
    Some((new_w, new_h))
}
