//! Editor configuration.
//!
//! Handles loading, validating, and merging `retouch.toml`. The file lives in
//! the library root (next to the images it manages) and is merged over the
//! stock defaults, so it only needs the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! overwrite = false         # Discard intermediate edits instead of archiving them
//! preview_max = 400         # Longest edge of the editing preview, in pixels
//! quality = 90              # JPEG quality (1-100)
//! lock_timeout_ms = 10000   # How long to wait for a busy asset
//!
//! [[sizes]]
//! name = "thumbnail"
//! width = 150
//! height = 150
//! crop = true
//! ```
//!
//! `sizes` is replaced as a whole when present: listing one size drops the
//! stock ones. Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_PREVIEW_MAX, Quality};
use crate::renditions::RenditionSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config file name, looked up in the library root.
pub const CONFIG_FILE: &str = "retouch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Editor configuration loaded from `retouch.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Discard intermediate edited files instead of archiving them.
    pub overwrite: bool,
    /// Longest edge of the preview crop selections are made against.
    pub preview_max: u32,
    /// Lossy encode quality.
    pub quality: u32,
    /// Wait for a locked asset this long before giving up.
    pub lock_timeout_ms: u64,
    /// Renditions generated for every asset, in order.
    pub sizes: Vec<RenditionSpec>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            preview_max: DEFAULT_PREVIEW_MAX,
            quality: 90,
            lock_timeout_ms: 10_000,
            sizes: default_sizes(),
        }
    }
}

fn default_sizes() -> Vec<RenditionSpec> {
    vec![
        RenditionSpec::new("thumbnail", 150, 150, true),
        RenditionSpec::new("medium", 300, 300, false),
        RenditionSpec::new("medium_large", 768, 0, false),
        RenditionSpec::new("large", 1024, 1024, false),
    ]
}

impl EditorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview_max == 0 {
            return Err(ConfigError::Validation(
                "preview_max must be greater than 0".into(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        let mut seen = HashSet::new();
        for size in &self.sizes {
            if size.name.is_empty() {
                return Err(ConfigError::Validation("sizes.name must not be empty".into()));
            }
            if size.name == crate::backup::FULL {
                return Err(ConfigError::Validation(
                    "sizes.name 'full' is reserved for the full-size image".into(),
                ));
            }
            if !seen.insert(size.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate size name '{}'",
                    size.name
                )));
            }
            if size.width == 0 && size.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "size '{}' needs a non-zero width or height",
                    size.name
                )));
            }
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EditorConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `retouch.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it is not valid TOML.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<EditorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EditorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `retouch.toml` in the library root.
pub fn load_config(root: &Path) -> Result<EditorConfig, ConfigError> {
    resolve_config(load_raw_config(root)?)
}

/// Returns a fully-commented stock `retouch.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Retouch Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# When true, saving an edit deletes the previous edited version instead of
# keeping it in the backup registry. The original upload is always kept.
overwrite = false

# Longest edge, in pixels, of the preview the editor shows. Crop selections
# are made on the preview and scaled back up by this ratio.
preview_max = 400

# JPEG encoding quality (1 = worst, 100 = best).
quality = 90

# Milliseconds to wait for another edit of the same asset to finish.
lock_timeout_ms = 10000

# ---------------------------------------------------------------------------
# Renditions
# ---------------------------------------------------------------------------
# Generated for every asset, in this order. A 0 dimension is unconstrained.
# crop = true fills the box exactly; crop = false fits inside it.
# Listing any [[sizes]] replaces this whole list.

[[sizes]]
name = "thumbnail"
width = 150
height = 150
crop = true

[[sizes]]
name = "medium"
width = 300
height = 300
crop = false

[[sizes]]
name = "medium_large"
width = 768
height = 0
crop = false

[[sizes]]
name = "large"
width = 1024
height = 1024
crop = false
"##
}
