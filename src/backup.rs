//! Per-asset backup registry.
//!
//! Every time an edit replaces the full-size image or a rendition, the
//! descriptor it replaces is archived here under a tag:
//!
//! | Tag | Meaning |
//! |---|---|
//! | `full-orig` | the full-size image as uploaded |
//! | `full-<suffix>` | an intermediate edited full-size image |
//! | `<size>-orig` | a rendition as generated at upload |
//! | `<size>-<suffix>` | an intermediate edited rendition |
//!
//! `-orig` entries are written once and never replaced, which is what makes
//! restore repeatable. Intermediate entries are only created outside
//! overwrite mode, and at most one entry per file name exists in a tag family.

use crate::types::RenditionDescriptor;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag family for the full-size image.
pub const FULL: &str = "full";

const ORIG: &str = "orig";

/// An archived image: a file name next to the asset's full-size file, plus its dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub width: u32,
    pub height: u32,
    pub file: String,
}

impl From<RenditionDescriptor> for BackupEntry {
    fn from(d: RenditionDescriptor) -> Self {
        Self {
            width: d.width,
            height: d.height,
            file: d.file,
        }
    }
}

impl From<BackupEntry> for RenditionDescriptor {
    fn from(e: BackupEntry) -> Self {
        Self {
            file: e.file,
            width: e.width,
            height: e.height,
        }
    }
}

/// Version suffix shared by an edited filename and the backup tags written
/// in the same save: Unix seconds followed by three random digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Suffix(u64);

impl Suffix {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where fresh suffixes come from.
pub trait SuffixSource: Send + Sync {
    fn seed(&self) -> Suffix;
}

/// Wall clock seconds with a random three-digit tail.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSuffix;

impl SuffixSource for SystemSuffix {
    fn seed(&self) -> Suffix {
        let secs = chrono::Utc::now().timestamp().max(0) as u64;
        let tail: u64 = rand::rng().random_range(100..=999);
        Suffix(secs * 1000 + tail)
    }
}

/// Always hands out the same seed.
#[derive(Debug, Clone, Copy)]
pub struct FixedSuffix(pub u64);

impl SuffixSource for FixedSuffix {
    fn seed(&self) -> Suffix {
        Suffix(self.0)
    }
}

pub fn orig_tag(base: &str) -> String {
    format!("{}-{}", base, ORIG)
}

/// Map of backup tag to archived descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupRegistry(BTreeMap<String, BackupEntry>);

impl BackupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<&BackupEntry> {
        self.0.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BackupEntry)> {
        self.0.iter()
    }

    /// The archived original for a tag family. The entry stays in the registry.
    pub fn restore_orig(&self, base: &str) -> Option<BackupEntry> {
        self.0.get(&orig_tag(base)).cloned()
    }

    /// Whether `file` is the archived original of the family.
    pub fn is_original(&self, base: &str, file: &str) -> bool {
        self.0
            .get(&orig_tag(base))
            .is_some_and(|entry| entry.file == file)
    }

    /// Whether any entry in the family points at `file`.
    pub fn references_file(&self, base: &str, file: &str) -> bool {
        self.family(base).any(|(_, entry)| entry.file == file)
    }

    fn family<'a>(&'a self, base: &'a str) -> impl Iterator<Item = (&'a String, &'a BackupEntry)> {
        self.0.iter().filter(move |(tag, _)| {
            tag.strip_prefix(base)
                .and_then(|rest| rest.strip_prefix('-'))
                .is_some_and(|rest| rest == ORIG || rest.bytes().all(|b| b.is_ascii_digit()))
        })
    }

    /// Archive `current` before it is replaced by an edit.
    ///
    /// - No `-orig` entry yet: `current` becomes `<base>-orig`.
    /// - Otherwise, outside overwrite mode, an edited `current` is kept as
    ///   `<base>-<suffix>`.
    /// - In overwrite mode nothing is archived; the caller discards the file.
    ///
    /// Returns the tag written, if any.
    pub fn archive_if_needed(
        &mut self,
        base: &str,
        current: &BackupEntry,
        overwrite: bool,
        suffix: Suffix,
    ) -> Option<String> {
        let orig = orig_tag(base);
        if !self.0.contains_key(&orig) {
            self.0.insert(orig.clone(), current.clone());
            return Some(orig);
        }
        if overwrite || self.is_original(base, &current.file) {
            return None;
        }
        self.archive_version(base, current, suffix)
    }

    /// Keep `current` as `<base>-<suffix>` unless the family already holds it.
    pub fn archive_version(
        &mut self,
        base: &str,
        current: &BackupEntry,
        suffix: Suffix,
    ) -> Option<String> {
        if self.references_file(base, &current.file) {
            return None;
        }
        let mut suffix = suffix;
        let tag = loop {
            let candidate = format!("{}-{}", base, suffix);
            if !self.0.contains_key(&candidate) {
                break candidate;
            }
            suffix = suffix.next();
        };
        self.0.insert(tag.clone(), current.clone());
        Some(tag)
    }
}
