//! Which files an edit rewrites.
//!
//! A save always writes a new full-size image (renditions are derived from
//! it), but the [`Target`] decides whether that image replaces the asset's
//! full size and which named renditions are regenerated:
//!
//! | Target | Full size replaced | Renditions regenerated |
//! |---|---|---|
//! | `All` | yes | every configured size |
//! | `Full` | yes | none |
//! | `NoThumb` | yes | every size except `thumbnail` |
//! | `Thumbnail` | no | `thumbnail` only, never cropped |
//! | `DirectScale` | yes, resized | none |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size name treated specially by [`Target::Thumbnail`] and [`Target::NoThumb`].
pub const THUMBNAIL: &str = "thumbnail";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Thumbnail,
    NoThumb,
    Full,
    DirectScale { width: u32, height: u32 },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Thumbnail => f.write_str("thumbnail"),
            Self::NoThumb => f.write_str("nothumb"),
            Self::Full => f.write_str("full"),
            Self::DirectScale { width, height } => write!(f, "scale {}x{}", width, height),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "thumbnail" => Ok(Self::Thumbnail),
            "nothumb" => Ok(Self::NoThumb),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown target '{}': expected all, full, nothumb or thumbnail",
                other
            )),
        }
    }
}

/// A configured rendition size. A `0` dimension is unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenditionSpec {
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub crop: bool,
}

impl RenditionSpec {
    pub fn new(name: &str, width: u32, height: u32, crop: bool) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            crop,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRendition {
    pub spec: RenditionSpec,
    pub crop_override: Option<bool>,
}

impl PlannedRendition {
    /// Effective crop policy.
    pub fn crop(&self) -> bool {
        self.crop_override.unwrap_or(self.spec.crop)
    }
}

/// Outcome of planning one save.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionPlan {
    /// The new full-size file becomes the asset's full size. When false it
    /// only serves as the source for renditions and is removed afterwards.
    pub replace_full: bool,
    pub renditions: Vec<PlannedRendition>,
}

/// Decides what a save regenerates, from the configured sizes.
pub struct RenditionPlanner<'a> {
    sizes: &'a [RenditionSpec],
}

impl<'a> RenditionPlanner<'a> {
    pub fn new(sizes: &'a [RenditionSpec]) -> Self {
        Self { sizes }
    }

    pub fn plan(&self, target: Target) -> RenditionPlan {
        match target {
            Target::All => RenditionPlan {
                replace_full: true,
                renditions: self.select(|_| true, None),
            },
            Target::NoThumb => RenditionPlan {
                replace_full: true,
                renditions: self.select(|s| s.name != THUMBNAIL, None),
            },
            Target::Full | Target::DirectScale { .. } => RenditionPlan {
                replace_full: true,
                renditions: Vec::new(),
            },
            Target::Thumbnail => RenditionPlan {
                replace_full: false,
                renditions: self.select(|s| s.name == THUMBNAIL, Some(false)),
            },
        }
    }

    fn select(
        &self,
        keep: impl Fn(&RenditionSpec) -> bool,
        crop_override: Option<bool>,
    ) -> Vec<PlannedRendition> {
        self.sizes
            .iter()
            .filter(|s| keep(s))
            .map(|s| PlannedRendition {
                spec: s.clone(),
                crop_override,
            })
            .collect()
    }
}
