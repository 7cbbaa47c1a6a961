//! Centralized filename handling for edited images.
//!
//! Every save writes the full-size image under a fresh name so earlier
//! versions stay on disk for the backup registry:
//!
//! - `beach.jpg` → `beach-e1700000000123.jpg`
//! - `beach-e1700000000123.jpg` → `beach-e1700000000456.jpg` (the old marker is
//!   replaced, not stacked)
//!
//! Renditions are named after the file they were derived from:
//! `beach-e1700000000456-150x150.jpg`.
//!
//! The 13 digits are a [`Suffix`](crate::backup::Suffix): Unix seconds followed
//! by three random digits. Purges only ever delete files carrying that marker,
//! which is how an uploaded original (no marker) is kept safe.

use std::path::{Path, PathBuf};

/// Digits in an edit marker produced by this crate.
const MARKER_DIGITS: usize = 13;

/// Remove a trailing `-e<digits>` marker from a file stem, if any.
///
/// Any digit count is stripped so hand-renamed files still collapse to one
/// marker.
pub fn strip_edit_marker(stem: &str) -> &str {
    if let Some(pos) = stem.rfind("-e") {
        let digits = &stem[pos + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return &stem[..pos];
        }
    }
    stem
}

/// `<stem>-e<suffix>` for a stem that may already carry a marker.
pub fn edited_stem(stem: &str, suffix: u64) -> String {
    format!("{}-e{}", strip_edit_marker(stem), suffix)
}

/// Pick a free path for the next edited version of `current`.
///
/// Starts at `suffix` and increments it until `exists` reports the candidate
/// free. Returns the chosen path and the suffix that produced it, so backup
/// tags from the same save line up with the filename.
pub fn next_edited_path(
    current: &Path,
    suffix: u64,
    exists: impl Fn(&Path) -> bool,
) -> (PathBuf, u64) {
    let dir = current.parent().unwrap_or_else(|| Path::new(""));
    let stem = current
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = current.extension().map(|e| e.to_string_lossy().to_string());

    let mut suffix = suffix;
    loop {
        let mut name = edited_stem(&stem, suffix);
        if let Some(ext) = &ext {
            name.push('.');
            name.push_str(ext);
        }
        let candidate = dir.join(name);
        if !exists(&candidate) {
            return (candidate, suffix);
        }
        suffix += 1;
    }
}

/// File name of a rendition derived from `source`: `<stem>-<w>x<h>.<ext>`.
pub fn rendition_file_name(source: &Path, width: u32, height: u32) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match source.extension() {
        Some(ext) => format!("{}-{}x{}.{}", stem, width, height, ext.to_string_lossy()),
        None => format!("{}-{}x{}", stem, width, height),
    }
}

/// Whether `name` contains `-e<13 digits>` immediately followed by `terminator`.
fn has_marker(name: &str, terminator: u8) -> bool {
    let bytes = name.as_bytes();
    let mut from = 0;
    while let Some(offset) = name[from..].find("-e") {
        let start = from + offset + 2;
        let end = start + MARKER_DIGITS;
        if end < bytes.len()
            && bytes[start..end].iter().all(u8::is_ascii_digit)
            && bytes[end] == terminator
        {
            return true;
        }
        from = from + offset + 1;
    }
    false
}

/// A full-size file written by an edit: `…-e<13 digits>.<ext>`.
pub fn is_edited_full(file_name: &str) -> bool {
    has_marker(file_name, b'.')
}

/// A rendition derived from an edited full-size file: `…-e<13 digits>-<w>x<h>.<ext>`.
pub fn is_edited_rendition(file_name: &str) -> bool {
    has_marker(file_name, b'-')
}

/// Final path component as a string.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SUFFIX: u64 = 1_700_000_000_123;

    #[test]
    fn strip_marker_from_edited_stem() {
        assert_eq!(strip_edit_marker("beach-e1700000000123"), "beach");
    }

    #[test]
    fn strip_marker_any_digit_count() {
        assert_eq!(strip_edit_marker("beach-e12"), "beach");
    }

    #[test]
    fn strip_leaves_plain_stem() {
        assert_eq!(strip_edit_marker("beach"), "beach");
        assert_eq!(strip_edit_marker("my-edit"), "my-edit");
        assert_eq!(strip_edit_marker("photo-e"), "photo-e");
        assert_eq!(strip_edit_marker("photo-e12x"), "photo-e12x");
    }

    #[test]
    fn edited_stem_replaces_existing_marker() {
        assert_eq!(
            edited_stem("beach-e1600000000999", SUFFIX),
            "beach-e1700000000123"
        );
    }

    #[test]
    fn next_path_free_on_first_try() {
        let (path, suffix) =
            next_edited_path(Path::new("2024/beach.jpg"), SUFFIX, |_| false);
        assert_eq!(path, PathBuf::from("2024/beach-e1700000000123.jpg"));
        assert_eq!(suffix, SUFFIX);
    }

    #[test]
    fn next_path_increments_on_collision() {
        let taken: HashSet<PathBuf> = [
            PathBuf::from("beach-e1700000000123.jpg"),
            PathBuf::from("beach-e1700000000124.jpg"),
        ]
        .into_iter()
        .collect();
        let (path, suffix) =
            next_edited_path(Path::new("beach.jpg"), SUFFIX, |p| taken.contains(p));
        assert_eq!(path, PathBuf::from("beach-e1700000000125.jpg"));
        assert_eq!(suffix, SUFFIX + 2);
    }

    #[test]
    fn next_path_from_edited_file_does_not_stack_markers() {
        let (path, _) = next_edited_path(Path::new("beach-e1600000000999.png"), SUFFIX, |_| false);
        assert_eq!(path, PathBuf::from("beach-e1700000000123.png"));
    }

    #[test]
    fn rendition_name_uses_source_stem() {
        assert_eq!(
            rendition_file_name(Path::new("a/beach-e1700000000123.jpg"), 150, 150),
            "beach-e1700000000123-150x150.jpg"
        );
    }

    #[test]
    fn edited_full_pattern() {
        assert!(is_edited_full("beach-e1700000000123.jpg"));
        assert!(!is_edited_full("beach.jpg"));
        assert!(!is_edited_full("beach-e170000000012.jpg"));
        assert!(!is_edited_full("beach-e1700000000123-150x150.jpg"));
    }

    #[test]
    fn edited_rendition_pattern() {
        assert!(is_edited_rendition("beach-e1700000000123-150x150.jpg"));
        assert!(!is_edited_rendition("beach-150x150.jpg"));
        assert!(!is_edited_rendition("beach-e1700000000123.jpg"));
    }

    #[test]
    fn marker_found_after_decoy() {
        assert!(is_edited_full("my-edits-e1700000000123.jpg"));
    }
}
