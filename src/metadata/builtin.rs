//! Built-in EXIF decoder: reads IFD0 and the Exif sub-IFD directly from the
//! file bytes. Covers the standard tags only; maker notes are out of reach.

use super::container::exif_block;
use super::decode::{self, non_empty};
use super::tiff::{EXIF_IFD_POINTER, Entry, Tiff};
use super::{ExifInfo, Extraction, format_datetime, parse_exif_datetime};
use std::collections::HashMap;

mod tag {
    pub const IMAGE_DESCRIPTION: u16 = 0x010E;
    pub const MAKE: u16 = 0x010F;
    pub const MODEL: u16 = 0x0110;
    pub const ORIENTATION: u16 = 0x0112;
    pub const SOFTWARE: u16 = 0x0131;
    pub const DATE_TIME: u16 = 0x0132;
    pub const ARTIST: u16 = 0x013B;
    pub const COPYRIGHT: u16 = 0x8298;
    pub const EXPOSURE_TIME: u16 = 0x829A;
    pub const F_NUMBER: u16 = 0x829D;
    pub const EXPOSURE_PROGRAM: u16 = 0x8822;
    pub const ISO: u16 = 0x8827;
    pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
    pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
    pub const EXPOSURE_BIAS: u16 = 0x9204;
    pub const MAX_APERTURE: u16 = 0x9205;
    pub const SUBJECT_DISTANCE: u16 = 0x9206;
    pub const METERING_MODE: u16 = 0x9207;
    pub const FLASH: u16 = 0x9209;
    pub const FOCAL_LENGTH: u16 = 0x920A;
    pub const COLOR_SPACE: u16 = 0xA001;
    pub const PIXEL_X: u16 = 0xA002;
    pub const PIXEL_Y: u16 = 0xA003;
    pub const SENSING_METHOD: u16 = 0xA217;
    pub const FILE_SOURCE: u16 = 0xA300;
    pub const SCENE_TYPE: u16 = 0xA301;
    pub const CUSTOM_RENDERED: u16 = 0xA401;
    pub const EXPOSURE_MODE: u16 = 0xA402;
    pub const WHITE_BALANCE: u16 = 0xA403;
    pub const DIGITAL_ZOOM: u16 = 0xA404;
    pub const FOCAL_LENGTH_35MM: u16 = 0xA405;
    pub const SCENE_CAPTURE_TYPE: u16 = 0xA406;
    pub const GAIN_CONTROL: u16 = 0xA407;
    pub const CONTRAST: u16 = 0xA408;
    pub const SATURATION: u16 = 0xA409;
    pub const SHARPNESS: u16 = 0xA40A;
    pub const SUBJECT_DISTANCE_RANGE: u16 = 0xA40C;
    pub const IMAGE_UNIQUE_ID: u16 = 0xA420;
    pub const SERIAL_NUMBER: u16 = 0xA431;
    pub const LENS_SPEC: u16 = 0xA432;
    pub const LENS_MODEL: u16 = 0xA434;
}

/// Tag lookup over IFD0 merged with the Exif sub-IFD.
struct Fields<'a> {
    tiff: Tiff<'a>,
    entries: HashMap<u16, Entry>,
}

impl Fields<'_> {
    fn get(&self, tag: u16) -> Option<&Entry> {
        self.entries.get(&tag)
    }

    fn text(&self, tag: u16) -> Option<String> {
        self.get(tag).and_then(|e| self.tiff.ascii(e))
    }

    fn uint(&self, tag: u16) -> Option<u32> {
        self.get(tag).and_then(|e| self.tiff.uint(e, 0))
    }

    fn float(&self, tag: u16) -> Option<f64> {
        let entry = self.get(tag)?;
        self.tiff
            .rational(entry)
            .or_else(|| self.tiff.uint(entry, 0).map(f64::from))
    }

    fn positive(&self, tag: u16) -> Option<f64> {
        self.float(tag).filter(|v| *v > 0.0)
    }

    fn table(&self, tag: u16, lookup: fn(u32) -> &'static str) -> Option<String> {
        self.uint(tag).and_then(|code| non_empty(lookup(code)))
    }
}

/// Decode the EXIF block of an image held in memory.
///
/// Files without a recognisable EXIF block yield an empty record.
pub fn decode(bytes: &[u8]) -> Extraction {
    let Some(block) = exif_block(bytes) else {
        return Extraction::default();
    };
    let Some(tiff) = Tiff::parse(block) else {
        return Extraction::default();
    };
    let Some(ifd0) = tiff.ifd0_offset() else {
        return Extraction::default();
    };

    let mut entries: HashMap<u16, Entry> = tiff
        .entries(ifd0)
        .into_iter()
        .map(|e| (e.tag, e))
        .collect();
    if let Some(exif_ptr) = entries.get(&EXIF_IFD_POINTER).and_then(|e| tiff.uint(e, 0)) {
        // Exif sub-IFD values win over IFD0 duplicates
        entries.extend(tiff.entries(exif_ptr as usize).into_iter().map(|e| (e.tag, e)));
    }
    let fields = Fields { tiff, entries };
    decode_fields(&fields)
}

fn decode_fields(f: &Fields<'_>) -> Extraction {
    let original = f
        .text(tag::DATE_TIME_ORIGINAL)
        .as_deref()
        .and_then(parse_exif_datetime);
    let modified = f.text(tag::DATE_TIME);
    let taken_at = original.or_else(|| modified.as_deref().and_then(parse_exif_datetime));

    let lens_info = f.get(tag::LENS_SPEC).and_then(|e| {
        let min = f.tiff.rational_at(e, 0)?;
        let max = f.tiff.rational_at(e, 1).unwrap_or(min);
        Some(if (max - min).abs() < f64::EPSILON {
            format!("{:.0} mm", min)
        } else {
            format!("{:.0} - {:.0} mm", min, max)
        })
    });

    let shutter_speed = f.get(tag::EXPOSURE_TIME).and_then(|e| {
        let (num, den) = f.tiff.rational_parts(e)?;
        (num > 0 && den > 0).then(|| decode::shutter_speed(num as f64 / den as f64))
    });

    let info = ExifInfo {
        camera_make: f.text(tag::MAKE),
        camera_model: f.text(tag::MODEL),
        lens_model: f.text(tag::LENS_MODEL),
        lens_info,
        serial_number: f.text(tag::SERIAL_NUMBER),
        focal_length: f.positive(tag::FOCAL_LENGTH).map(decode::focal_length),
        focal_length_35mm: f
            .uint(tag::FOCAL_LENGTH_35MM)
            .filter(|v| *v > 0)
            .map(|v| decode::focal_length_35mm(v as f64)),
        max_aperture_value: f.positive(tag::MAX_APERTURE).map(decode::aperture_from_apex),
        subject_distance: f.positive(tag::SUBJECT_DISTANCE).map(decode::subject_distance),
        subject_distance_range: f.table(tag::SUBJECT_DISTANCE_RANGE, decode::subject_distance_range),
        aperture: f.positive(tag::F_NUMBER).map(decode::aperture),
        shutter_speed,
        iso: f.uint(tag::ISO),
        exposure_comp: f.float(tag::EXPOSURE_BIAS).map(decode::exposure_compensation),
        exposure_mode: f.table(tag::EXPOSURE_MODE, decode::exposure_mode),
        exposure_program: f.table(tag::EXPOSURE_PROGRAM, decode::exposure_program),
        metering_mode: f.table(tag::METERING_MODE, decode::metering_mode),
        flash: f.uint(tag::FLASH).map(decode::flash),
        white_balance: f.table(tag::WHITE_BALANCE, decode::white_balance),
        color_space: f.table(tag::COLOR_SPACE, decode::color_space),
        contrast: f.table(tag::CONTRAST, decode::level),
        saturation: f.table(tag::SATURATION, decode::level),
        sharpness: f.table(tag::SHARPNESS, decode::level),
        scene_capture_type: f.table(tag::SCENE_CAPTURE_TYPE, decode::scene_capture_type),
        scene_type: f.table(tag::SCENE_TYPE, decode::scene_type),
        sensing_method: f.table(tag::SENSING_METHOD, decode::sensing_method),
        file_source: f.table(tag::FILE_SOURCE, decode::file_source),
        custom_rendered: f.table(tag::CUSTOM_RENDERED, decode::custom_rendered),
        gain_control: f.table(tag::GAIN_CONTROL, decode::gain_control),
        digital_zoom: f.float(tag::DIGITAL_ZOOM).map(decode::digital_zoom),
        orientation: f.uint(tag::ORIENTATION).and_then(|v| u16::try_from(v).ok()),
        image_width: f.uint(tag::PIXEL_X),
        image_height: f.uint(tag::PIXEL_Y),
        datetime_original: original.map(format_datetime),
        create_date: f.text(tag::DATE_TIME_DIGITIZED),
        modify_date: modified,
        artist: f.text(tag::ARTIST),
        copyright: f.text(tag::COPYRIGHT),
        software: f.text(tag::SOFTWARE),
        image_description: f.text(tag::IMAGE_DESCRIPTION),
        image_unique_id: f.text(tag::IMAGE_UNIQUE_ID),
        ..ExifInfo::default()
    };

    Extraction { info, taken_at }
}
