//! Rich extraction through the external `exiftool` program.
//!
//! Invoked as `exiftool -json -a -G1 -n <file>`: group-prefixed keys
//! (`IFD0:Make`, `ExifIFD:FNumber`, `Canon:FocusMode`, `Composite:Lens`)
//! with numeric values left unformatted. Maker-note groups give access to
//! fields the built-in decoder cannot see.

use super::decode::{self, non_empty};
use super::{ExifInfo, Extraction, format_datetime, parse_exif_datetime};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A located, working exiftool binary.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    version: String,
}

impl ExifTool {
    /// Run `<program> -ver`; `None` if it cannot be executed.
    pub fn probe(program: &Path) -> Option<Self> {
        let output = Command::new(program).arg("-ver").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Some(Self {
            program: program.to_path_buf(),
            version,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run exiftool on one file. `None` on spawn failure, a non-zero exit or
    /// output that does not parse.
    pub fn run(&self, path: &Path) -> Option<Extraction> {
        let output = Command::new(&self.program)
            .args(["-json", "-a", "-G1", "-n"])
            .arg(path)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_output(&output.stdout)
    }
}

/// Parse exiftool's JSON (an array with one object per file).
pub fn parse_output(stdout: &[u8]) -> Option<Extraction> {
    let results: Vec<Map<String, Value>> = serde_json::from_slice(stdout).ok()?;
    results.first().map(map_tags)
}

fn get_str(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => non_empty(s.trim()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            Some(if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("{}", f as i64)
            } else {
                format!("{:.2}", f)
            })
        }
        _ => None,
    }
}

fn get_f64(data: &Map<String, Value>, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_u32(data: &Map<String, Value>, key: &str) -> Option<u32> {
    get_f64(data, key).filter(|v| *v >= 0.0 && *v <= u32::MAX as f64).map(|v| v as u32)
}

fn first_str(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| get_str(data, k))
}

fn positive(data: &Map<String, Value>, key: &str) -> Option<f64> {
    get_f64(data, key).filter(|v| *v > 0.0)
}

fn table(data: &Map<String, Value>, key: &str, lookup: fn(u32) -> &'static str) -> Option<String> {
    get_u32(data, key).and_then(|code| non_empty(lookup(code)))
}

/// A string value that is not just a number. Composite tags computed from
/// raw codes come through `-n` as bare numbers and carry no label.
fn text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if s.trim().parse::<f64>().is_err() => non_empty(s.trim()),
        _ => None,
    }
}

fn canon_code(data: &Map<String, Value>, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Canon maker-note setting: numeric codes go through `lookup`, labels
/// from older exiftool builds pass through.
fn canon(data: &Map<String, Value>, key: &str, lookup: fn(i64) -> &'static str) -> Option<String> {
    match canon_code(data, key) {
        Some(code) => non_empty(lookup(code)),
        None => text(data, key),
    }
}

/// Map one exiftool result object onto the metadata record.
pub fn map_tags(data: &Map<String, Value>) -> Extraction {
    let lens_info = match positive(data, "Canon:MinFocalLength") {
        Some(min) => {
            let max = get_f64(data, "Canon:MaxFocalLength").unwrap_or(min);
            Some(format!("{:.0} - {:.0} mm", min, max))
        }
        None => get_str(data, "ExifIFD:LensInfo"),
    };

    let focal_length_35mm = positive(data, "ExifIFD:FocalLengthIn35mmFormat")
        .map(decode::focal_length_35mm)
        .or_else(|| positive(data, "Composite:FocalLength35efl").map(decode::focal_length));

    let focus_distance = positive(data, "Canon:FocusDistanceUpper").map(|upper| {
        match positive(data, "Canon:FocusDistanceLower") {
            Some(lower) if lower != upper => format!("{:.2} - {:.2} m", lower, upper),
            _ => format!("{:.2} m", upper),
        }
    });

    let contrast = get_str(data, "Canon:Contrast")
        .map(|s| decode::canon_level(&s))
        .or_else(|| table(data, "ExifIFD:Contrast", decode::level));
    let saturation = get_str(data, "Canon:Saturation")
        .map(|s| decode::canon_level(&s))
        .or_else(|| table(data, "ExifIFD:Saturation", decode::level));
    let sharpness = get_str(data, "Canon:Sharpness")
        .map(|s| if s == "0" { "Normal".to_string() } else { s })
        .or_else(|| table(data, "ExifIFD:Sharpness", decode::level));

    let file_source = get_str(data, "ExifIFD:FileSource").map(|s| {
        if s == "3" {
            decode::file_source(3).to_string()
        } else {
            s
        }
    });

    let original = get_str(data, "ExifIFD:DateTimeOriginal")
        .as_deref()
        .and_then(parse_exif_datetime);

    let info = ExifInfo {
        camera_make: get_str(data, "IFD0:Make"),
        camera_model: first_str(data, &["IFD0:Model", "IFD0:CameraModelName"]),
        lens_model: first_str(data, &["ExifIFD:LensModel", "Composite:Lens"]),
        lens_info,
        serial_number: first_str(data, &["Canon:SerialNumber", "ExifIFD:SerialNumber"]),
        firmware_version: first_str(data, &["Canon:FirmwareVersion", "Canon:CanonFirmwareVersion"]),

        focal_length: positive(data, "ExifIFD:FocalLength").map(decode::focal_length),
        focal_length_35mm,
        // Value conversion already turned the APEX value into an F-number
        max_aperture_value: positive(data, "ExifIFD:MaxApertureValue").map(decode::aperture),
        focus_mode: canon(data, "Canon:FocusMode", decode::canon_focus_mode)
            .or_else(|| get_str(data, "ExifIFD:FocusMode")),
        focus_distance,
        subject_distance: positive(data, "ExifIFD:SubjectDistance").map(decode::subject_distance),
        subject_distance_range: table(
            data,
            "ExifIFD:SubjectDistanceRange",
            decode::subject_distance_range,
        ),
        depth_of_field: get_str(data, "Composite:DOF"),
        hyperfocal_distance: get_str(data, "Composite:HyperfocalDistance"),

        aperture: positive(data, "ExifIFD:FNumber").map(decode::aperture),
        shutter_speed: positive(data, "ExifIFD:ExposureTime").map(decode::shutter_speed),
        iso: get_u32(data, "ExifIFD:ISO"),
        exposure_comp: get_f64(data, "ExifIFD:ExposureCompensation")
            .map(decode::exposure_compensation),
        exposure_mode: table(data, "ExifIFD:ExposureMode", decode::exposure_mode),
        exposure_program: table(data, "ExifIFD:ExposureProgram", decode::exposure_program),
        metering_mode: table(data, "ExifIFD:MeteringMode", decode::metering_mode),
        light_value: get_f64(data, "Composite:LightValue").map(|v| format!("{:.1}", v)),

        flash: get_u32(data, "ExifIFD:Flash").map(decode::flash),
        flash_mode: canon(data, "Canon:CanonFlashMode", decode::canon_flash_mode),
        flash_exposure_comp: get_f64(data, "Canon:FlashExposureComp")
            .map(|v| format!("{:.1} EV", v)),

        white_balance: table(data, "ExifIFD:WhiteBalance", decode::white_balance),
        color_space: table(data, "ExifIFD:ColorSpace", decode::color_space),
        color_temperature: get_u32(data, "Canon:ColorTemperature").filter(|v| *v > 0),
        contrast,
        saturation,
        sharpness,

        scene_capture_type: table(data, "ExifIFD:SceneCaptureType", decode::scene_capture_type),
        scene_type: table(data, "ExifIFD:SceneType", decode::scene_type),
        shooting_mode: text(data, "Composite:ShootingMode")
            .or_else(|| canon(data, "Canon:EasyMode", decode::canon_easy_mode)),
        drive_mode: text(data, "Composite:DriveMode")
            .or_else(|| canon(data, "Canon:ContinuousDrive", decode::canon_drive_mode)),
        macro_mode: canon(data, "Canon:MacroMode", decode::canon_macro_mode),
        self_timer: match canon_code(data, "Canon:SelfTimer") {
            Some(code) => non_empty(&decode::canon_self_timer(code)),
            None => text(data, "Canon:SelfTimer"),
        },
        image_stabilization: canon(
            data,
            "Canon:ImageStabilization",
            decode::canon_image_stabilization,
        ),
        digital_zoom: get_f64(data, "ExifIFD:DigitalZoomRatio").map(decode::digital_zoom),
        quality: canon(data, "Canon:Quality", decode::canon_quality),

        orientation: get_u32(data, "IFD0:Orientation").and_then(|v| u16::try_from(v).ok()),
        image_width: get_u32(data, "File:ImageWidth"),
        image_height: get_u32(data, "File:ImageHeight"),
        sensing_method: table(data, "ExifIFD:SensingMethod", decode::sensing_method),
        file_source,
        custom_rendered: table(data, "ExifIFD:CustomRendered", decode::custom_rendered),
        gain_control: table(data, "ExifIFD:GainControl", decode::gain_control),

        camera_temperature: get_str(data, "Canon:CameraTemperature"),
        file_number: get_str(data, "Canon:FileNumber"),
        owner_name: get_str(data, "Canon:OwnerName"),
        image_unique_id: first_str(data, &["Canon:ImageUniqueID", "ExifIFD:ImageUniqueID"]),

        datetime_original: original.map(format_datetime),
        create_date: get_str(data, "ExifIFD:CreateDate"),
        modify_date: get_str(data, "IFD0:ModifyDate"),

        artist: get_str(data, "IFD0:Artist"),
        copyright: get_str(data, "IFD0:Copyright"),
        software: get_str(data, "IFD0:Software"),
        image_description: get_str(data, "IFD0:ImageDescription"),
    };

    Extraction {
        info,
        taken_at: original,
    }
}
