//! Shared types used by the edit, restore and upload pipelines.
//!
//! These are persisted as JSON by the [`store`](crate::store) and must stay
//! stable across versions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid asset id {0:?}: use letters, digits, '-' or '_'")]
pub struct InvalidAssetId(String);

/// Opaque asset identifier.
///
/// Restricted to `[A-Za-z0-9_-]` because it doubles as a file name inside the
/// store directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidAssetId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid { Ok(Self(id)) } else { Err(InvalidAssetId(id)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetId {
    type Err = InvalidAssetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AssetId {
    type Error = InvalidAssetId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// One generated rendition. `file` is a bare file name living next to the
/// asset's full-size file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionDescriptor {
    pub file: String,
    pub width: u32,
    pub height: u32,
}

/// Everything known about an asset's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Full-size file, relative to the store root.
    pub file: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Renditions by size name.
    #[serde(default)]
    pub sizes: BTreeMap<String, RenditionDescriptor>,
}

impl ImageMetadata {
    /// Both dimensions are known. Assets without them cannot be edited.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// File name of the full-size image.
    pub fn basename(&self) -> String {
        crate::naming::basename(&self.file)
    }

    /// Directory holding the full-size file and its renditions, relative to the store root.
    pub fn dir(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Relative path of a file that sits next to the full-size image.
    pub fn sibling(&self, file_name: &str) -> PathBuf {
        self.dir().join(file_name)
    }
}
