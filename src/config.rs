//! Configuration module.
//!
//! Handles loading, validating and merging `lightbox.toml`. Stock defaults
//! are the base layer; a user file only needs the keys it overrides.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! media_root = "media"        # Scanned photo tree
//! cache_dir = ""              # Empty = <media_root>/.lightbox-cache
//! database = "lightbox.db"    # SQLite catalog file
//!
//! [metadata]
//! exiftool = "auto"           # "auto" probes once at startup, "off" forces built-in
//! exiftool_path = "exiftool"
//!
//! [thumbnails.small]
//! width = 300
//! quality = 80
//!
//! [thumbnails.medium]
//! width = 800
//! quality = 85
//!
//! [thumbnails.large]
//! width = 1600
//! quality = 90
//!
//! [placeholder]
//! render_size = 32            # Edge of the rendered placeholder PNG
//!
//! [scan]
//! extensions = ["jpg", "jpeg", "png"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache directory name used when `cache_dir` is empty. Starts with a dot so
/// the scanner's hidden-entry rule skips it.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".lightbox-cache";

/// Largest accepted `placeholder.render_size`.
pub const MAX_PLACEHOLDER_SIZE: u32 = 512;

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

/// Lightbox configuration loaded from `lightbox.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the photo tree to scan.
    pub media_root: PathBuf,
    /// Derivative cache root. Empty selects a hidden directory inside the
    /// media root.
    pub cache_dir: PathBuf,
    /// SQLite catalog file.
    pub database: PathBuf,
    pub metadata: MetadataConfig,
    pub thumbnails: ThumbnailsConfig,
    pub placeholder: PlaceholderConfig,
    pub scan: ScanConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            cache_dir: PathBuf::new(),
            database: PathBuf::from("lightbox.db"),
            metadata: MetadataConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            placeholder: PlaceholderConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Effective cache root.
    pub fn cache_root(&self) -> PathBuf {
        if self.cache_dir.as_os_str().is_empty() {
            self.media_root.join(DEFAULT_CACHE_DIR_NAME)
        } else {
            self.cache_dir.clone()
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, tier) in self.thumbnails.tiers() {
            if tier.width == 0 {
                return Err(ConfigError::Validation(format!(
                    "thumbnails.{name}.width must be non-zero"
                )));
            }
            if !(1..=100).contains(&tier.quality) {
                return Err(ConfigError::Validation(format!(
                    "thumbnails.{name}.quality must be 1-100"
                )));
            }
        }
        if !(1..=MAX_PLACEHOLDER_SIZE).contains(&self.placeholder.render_size) {
            return Err(ConfigError::Validation(format!(
                "placeholder.render_size must be 1-{MAX_PLACEHOLDER_SIZE}"
            )));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        if self.metadata.exiftool_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "metadata.exiftool_path must not be empty".into(),
            ));
        }
        if self.cache_root() == self.media_root {
            return Err(ConfigError::Validation(
                "cache_dir must not be the media root itself".into(),
            ));
        }
        Ok(())
    }

    /// The media root must already be a directory. Commands that walk or
    /// write under it refuse to start otherwise, so a mistyped path never
    /// empties the catalog or leaves a stray cache behind.
    pub fn check_media_root(&self) -> Result<(), ConfigError> {
        if self.media_root.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::Validation(format!(
                "media_root {} is not a directory",
                self.media_root.display()
            )))
        }
    }
}

/// Whether the external exiftool is probed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExifToolMode {
    #[default]
    Auto,
    Off,
}

/// Metadata extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub exiftool: ExifToolMode,
    /// Program name or path of exiftool.
    pub exiftool_path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            exiftool: ExifToolMode::Auto,
            exiftool_path: PathBuf::from("exiftool"),
        }
    }
}

/// Width bound and JPEG quality of one size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub width: u32,
    pub quality: u32,
}

/// The three thumbnail tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub small: TierConfig,
    pub medium: TierConfig,
    pub large: TierConfig,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            small: TierConfig {
                width: 300,
                quality: 80,
            },
            medium: TierConfig {
                width: 800,
                quality: 85,
            },
            large: TierConfig {
                width: 1600,
                quality: 90,
            },
        }
    }
}

impl ThumbnailsConfig {
    pub fn tiers(&self) -> [(&'static str, TierConfig); 3] {
        [
            ("small", self.small),
            ("medium", self.medium),
            ("large", self.large),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Edge length of the rendered placeholder image.
    pub render_size: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self { render_size: 32 }
    }
}

/// Scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions ingested, compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }
}

impl ScanConfig {
    /// Whether a file with this name should be ingested.
    pub fn accepts(&self, file_name: &str) -> bool {
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        !stem.is_empty()
            && self
                .extensions
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
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

/// Read a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// the file is absent.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `lightbox.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Lightbox Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# MEDIA_ROOT, CACHE_DIR and DATABASE_PATH in the environment override the
# matching top-level keys.

# Root of the photo tree to scan.
media_root = "media"

# Derivative cache root. Empty means <media_root>/.lightbox-cache, which the
# scanner skips because it starts with a dot.
cache_dir = ""

# SQLite catalog file.
database = "lightbox.db"

# ---------------------------------------------------------------------------
# Metadata extraction
# ---------------------------------------------------------------------------
[metadata]
# "auto" probes for exiftool once at startup and uses it when present;
# "off" always uses the built-in EXIF decoder.
exiftool = "auto"

# Program name or path of exiftool.
exiftool_path = "exiftool"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
# Width is an upper bound: smaller sources are never upscaled.
# Quality (1-100) applies to JPEG output; PNG sources stay PNG.
[thumbnails.small]
width = 300
quality = 80

[thumbnails.medium]
width = 800
quality = 85

[thumbnails.large]
width = 1600
quality = 90

# ---------------------------------------------------------------------------
# Placeholder
# ---------------------------------------------------------------------------
[placeholder]
# Edge length in pixels of the rendered placeholder PNG (1-512).
render_size = 32

# ---------------------------------------------------------------------------
# Scanning
# ---------------------------------------------------------------------------
[scan]
# File extensions to ingest, case-insensitive.
extensions = ["jpg", "jpeg", "png"]
"##
}
