//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Edit
//!
//! ```text
//! Saved beach → 2024/beach-e1700000000123.jpg (1000x2000)
//!     Thumbnail: 2024/beach-e1700000000123-150x150.jpg
//!     Archived: full-orig, thumbnail-orig, medium-orig
//! ```
//!
//! ## Restore
//!
//! ```text
//! Restored beach → 2024/beach.jpg (2000x1000)
//!     Archived: full-1700000050456
//! ```
//!
//! ## Show
//!
//! ```text
//! beach
//!     File: 2024/beach.jpg (2000x1000)
//!     Sizes
//!         medium: beach-300x150.jpg (300x150)
//!         thumbnail: beach-150x150.jpg (150x150)
//!     Backups
//!         full-orig: beach.jpg (2000x1000)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::backup::BackupRegistry;
use crate::edit::SaveSummary;
use crate::imaging::Dimensions;
use crate::restore::RestoreSummary;
use crate::types::{AssetId, ImageMetadata};
use std::path::{Path, PathBuf};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dims(width: u32, height: u32) -> String {
    format!("{}x{}", width, height)
}

/// Shared trailer for commands that archive or purge.
fn housekeeping_lines(archived: &[String], purged: &[PathBuf]) -> Vec<String> {
    let mut lines = Vec::new();
    if !archived.is_empty() {
        lines.push(format!("{}Archived: {}", indent(1), archived.join(", ")));
    }
    for path in purged {
        lines.push(format!("{}Removed: {}", indent(1), path.display()));
    }
    lines
}

pub fn format_save_output(id: &AssetId, summary: &SaveSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Saved {} → {} ({})",
        id,
        summary.file.display(),
        dims(summary.full_width, summary.full_height)
    )];
    if let Some(thumb) = &summary.thumbnail {
        lines.push(format!("{}Thumbnail: {}", indent(1), thumb.display()));
    }
    lines.extend(housekeeping_lines(&summary.archived, &summary.purged));
    lines
}

pub fn print_save_output(id: &AssetId, summary: &SaveSummary) {
    for line in format_save_output(id, summary) {
        println!("{}", line);
    }
}

pub fn format_restore_output(id: &AssetId, summary: &RestoreSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Restored {} → {} ({})",
        id,
        summary.file.display(),
        dims(summary.width, summary.height)
    )];
    lines.extend(housekeeping_lines(&summary.archived, &summary.purged));
    lines
}

pub fn print_restore_output(id: &AssetId, summary: &RestoreSummary) {
    for line in format_restore_output(id, summary) {
        println!("{}", line);
    }
}

pub fn format_import_output(id: &AssetId, meta: &ImageMetadata) -> Vec<String> {
    let mut lines = vec![format!(
        "Imported {} ← {} ({})",
        id,
        meta.file.display(),
        dims(meta.width, meta.height)
    )];
    for (name, size) in &meta.sizes {
        lines.push(format!("{}{}: {}", indent(1), name, size.file));
    }
    lines
}

pub fn print_import_output(id: &AssetId, meta: &ImageMetadata) {
    for line in format_import_output(id, meta) {
        println!("{}", line);
    }
}

pub fn format_preview_output(output: &Path, size: Dimensions) -> Vec<String> {
    vec![format!(
        "Preview → {} ({})",
        output.display(),
        dims(size.width, size.height)
    )]
}

pub fn print_preview_output(output: &Path, size: Dimensions) {
    for line in format_preview_output(output, size) {
        println!("{}", line);
    }
}

/// Current metadata and backup registry of one asset.
pub fn format_show_output(
    id: &AssetId,
    meta: &ImageMetadata,
    registry: &BackupRegistry,
) -> Vec<String> {
    let mut lines = vec![
        id.to_string(),
        format!(
            "{}File: {} ({})",
            indent(1),
            meta.file.display(),
            dims(meta.width, meta.height)
        ),
    ];
    if !meta.sizes.is_empty() {
        lines.push(format!("{}Sizes", indent(1)));
        for (name, size) in &meta.sizes {
            lines.push(format!(
                "{}{}: {} ({})",
                indent(2),
                name,
                size.file,
                dims(size.width, size.height)
            ));
        }
    }
    if !registry.is_empty() {
        lines.push(format!("{}Backups", indent(1)));
        for (tag, entry) in registry.iter() {
            lines.push(format!(
                "{}{}: {} ({})",
                indent(2),
                tag,
                entry.file,
                dims(entry.width, entry.height)
            ));
        }
    }
    lines
}

pub fn print_show_output(id: &AssetId, meta: &ImageMetadata, registry: &BackupRegistry) {
    for line in format_show_output(id, meta, registry) {
        println!("{}", line);
    }
}

/// One-line error report: `error[<kind>]: <message>`.
pub fn format_error(kind: &str, message: &str) -> String {
    format!("error[{}]: {}", kind, message)
}
