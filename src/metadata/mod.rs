//! Photo metadata extraction.
//!
//! Two strategies fill the same flat [`ExifInfo`] record:
//!
//! | Strategy | Source | Coverage |
//! |---|---|---|
//! | **Rich** | external `exiftool -json -a -G1 -n` | standard tags, composite values, Canon maker notes |
//! | **Built-in** | [`builtin`] TIFF/IFD reader | standard IFD0 + Exif sub-IFD tags |
//!
//! Which one runs is decided once, when the [`MetadataCodec`] is built: the
//! configured exiftool binary is probed and the rich strategy is used only if
//! it answers. A rich run that fails for a particular file falls back to the
//! built-in decoder for that file.
//!
//! Extraction never fails. Anything unreadable yields an empty record and no
//! capture time.
//!
//! Submodules:
//! - [`container`]: finding the EXIF block in JPEG, PNG and TIFF streams
//! - [`tiff`]: bounds-checked IFD walking
//! - [`decode`]: lookup tables and value formatting shared by both strategies

pub mod builtin;
pub mod container;
pub mod decode;
pub mod exiftool;
pub(crate) mod tiff;

use crate::config::{ExifToolMode, MetadataConfig};
use chrono::NaiveDateTime;
use exiftool::ExifTool;
use serde::{Deserialize, Serialize};
use std::path::Path;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const DISPLAY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), EXIF_DATETIME_FORMAT).ok()
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DISPLAY_DATETIME_FORMAT).to_string()
}

/// Camera and exposure metadata, already formatted for display.
///
/// Every field is optional; absent fields are omitted from the JSON form
/// stored on the photo row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExifInfo {
    // Camera and lens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,

    // Focal length and focus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length_35mm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_aperture_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_distance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_distance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_distance_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_of_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperfocal_distance: Option<String>,

    // Exposure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_comp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metering_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_value: Option<String>,

    // Flash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_exposure_comp: Option<String>,

    // Colour and tone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<String>,

    // Shooting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_capture_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shooting_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_timer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_stabilization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital_zoom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    // Image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensing_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_rendered: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_control: Option<String>,

    // Body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_temperature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_unique_id: Option<String>,

    // Dates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime_original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<String>,

    // Rights and description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
}

impl ExifInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub info: ExifInfo,
    /// Capture time as recorded by the camera (no timezone).
    pub taken_at: Option<NaiveDateTime>,
}

/// The extraction strategy chosen for this process.
#[derive(Debug, Clone)]
pub enum MetadataCodec {
    Rich(ExifTool),
    Builtin,
}

impl MetadataCodec {
    /// Probe for exiftool once, according to configuration.
    pub fn detect(config: &MetadataConfig) -> Self {
        if config.exiftool == ExifToolMode::Off {
            tracing::debug!("exiftool disabled by configuration");
            return Self::Builtin;
        }
        match ExifTool::probe(&config.exiftool_path) {
            Some(tool) => {
                tracing::info!(version = tool.version(), "using exiftool for metadata");
                Self::Rich(tool)
            }
            None => {
                tracing::info!(
                    program = %config.exiftool_path.display(),
                    "exiftool not available, using built-in EXIF decoder"
                );
                Self::Builtin
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rich(_) => "exiftool",
            Self::Builtin => "built-in",
        }
    }

    /// Extract metadata from one file. Never fails.
    pub fn extract(&self, path: &Path) -> Extraction {
        if let Self::Rich(tool) = self {
            if let Some(extraction) = tool.run(path) {
                return extraction;
            }
            tracing::debug!(path = %path.display(), "exiftool failed, falling back to built-in decoder");
        }
        match std::fs::read(path) {
            Ok(bytes) => builtin::decode(&bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot read file for metadata");
                Extraction::default()
            }
        }
    }
}
