//! Lookup tables and value formatters shared by both extraction strategies.
//!
//! Table functions return `""` for codes they do not know; callers turn the
//! empty string into an absent field with [`non_empty`].

pub fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ---------------------------------------------------------------------------
// Numeric formatters
// ---------------------------------------------------------------------------

pub fn focal_length(mm: f64) -> String {
    format!("{:.1} mm", mm)
}

pub fn focal_length_35mm(mm: f64) -> String {
    format!("{:.0} mm", mm)
}

pub fn aperture(f_number: f64) -> String {
    format!("f/{:.1}", f_number)
}

/// Max aperture from its APEX value: f = 2^(apex / 2).
pub fn aperture_from_apex(apex: f64) -> String {
    aperture(2f64.powf(apex / 2.0))
}

/// Whole seconds as `"2.0 s"`, fractions as `"1/250 s"`.
pub fn shutter_speed(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{:.1} s", seconds)
    } else {
        format!("1/{:.0} s", 1.0 / seconds)
    }
}

/// Always signed: `"+0.7 EV"`, `"-1.3 EV"`, `"+0.0 EV"`.
pub fn exposure_compensation(ev: f64) -> String {
    if ev >= 0.0 {
        format!("+{:.1} EV", ev)
    } else {
        format!("{:.1} EV", ev)
    }
}

/// Below one metre in centimetres, otherwise metres.
pub fn subject_distance(metres: f64) -> String {
    if metres < 1.0 {
        format!("{:.0} cm", metres * 100.0)
    } else {
        format!("{:.2} m", metres)
    }
}

/// A ratio of 1 or less means no digital zoom.
pub fn digital_zoom(ratio: f64) -> String {
    if ratio <= 1.0 {
        "None".to_string()
    } else {
        format!("{:.1}x", ratio)
    }
}

// ---------------------------------------------------------------------------
// Code tables
// ---------------------------------------------------------------------------

/// Flash is a bit field: bit 0 fired, bits 3-4 the mode.
pub fn flash(code: u32) -> String {
    let fired = if code & 1 == 1 {
        "Fired"
    } else {
        "Did not fire"
    };
    match (code >> 3) & 3 {
        1 => format!("{}, compulsory", fired),
        2 => format!("{}, suppressed", fired),
        3 => format!("{}, auto", fired),
        _ => fired.to_string(),
    }
}

pub fn metering_mode(code: u32) -> &'static str {
    match code {
        0 => "Unknown",
        1 => "Average",
        2 => "Center-weighted average",
        3 => "Spot",
        4 => "Multi-spot",
        5 => "Multi-segment",
        6 => "Partial",
        255 => "Other",
        _ => "",
    }
}

pub fn exposure_mode(code: u32) -> &'static str {
    match code {
        0 => "Auto",
        1 => "Manual",
        2 => "Auto bracket",
        _ => "",
    }
}

pub fn exposure_program(code: u32) -> &'static str {
    match code {
        0 => "Not defined",
        1 => "Manual",
        2 => "Program AE",
        3 => "Aperture priority",
        4 => "Shutter priority",
        5 => "Creative (slow speed)",
        6 => "Action (high speed)",
        7 => "Portrait",
        8 => "Landscape",
        9 => "Bulb",
        _ => "",
    }
}

pub fn white_balance(code: u32) -> &'static str {
    match code {
        0 => "Auto",
        1 => "Manual",
        _ => "",
    }
}

pub fn color_space(code: u32) -> &'static str {
    match code {
        1 => "sRGB",
        2 => "Adobe RGB",
        65535 => "Uncalibrated",
        _ => "",
    }
}

pub fn scene_capture_type(code: u32) -> &'static str {
    match code {
        0 => "Standard",
        1 => "Landscape",
        2 => "Portrait",
        3 => "Night scene",
        _ => "",
    }
}

pub fn scene_type(code: u32) -> &'static str {
    match code {
        1 => "Directly photographed",
        _ => "",
    }
}

pub fn subject_distance_range(code: u32) -> &'static str {
    match code {
        0 => "Unknown",
        1 => "Macro",
        2 => "Close",
        3 => "Distant",
        _ => "",
    }
}

pub fn sensing_method(code: u32) -> &'static str {
    match code {
        1 => "Not defined",
        2 => "One-chip color area",
        3 => "Two-chip color area",
        4 => "Three-chip color area",
        5 => "Color sequential area",
        7 => "Trilinear",
        8 => "Color sequential linear",
        _ => "",
    }
}

pub fn gain_control(code: u32) -> &'static str {
    match code {
        0 => "None",
        1 => "Low gain up",
        2 => "High gain up",
        3 => "Low gain down",
        4 => "High gain down",
        _ => "",
    }
}

/// Contrast, saturation and sharpness share one scale.
pub fn level(code: u32) -> &'static str {
    match code {
        0 => "Normal",
        1 => "Low",
        2 => "High",
        _ => "",
    }
}

pub fn custom_rendered(code: u32) -> &'static str {
    match code {
        0 => "Normal",
        1 => "Custom",
        _ => "",
    }
}

pub fn file_source(code: u32) -> &'static str {
    match code {
        3 => "Digital Camera",
        _ => "",
    }
}

/// Canon maker-note levels arrive either as codes or as words.
pub fn canon_level(raw: &str) -> String {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "0" | "normal" => "Normal".to_string(),
        "1" | "low" => "Low".to_string(),
        "2" | "high" => "High".to_string(),
        _ => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Canon camera settings
// ---------------------------------------------------------------------------
//
// Maker-note codes are signed; -1 marks a setting the body does not record
// and falls through to `""` like any unknown code.

pub fn canon_flash_mode(code: i64) -> &'static str {
    match code {
        0 => "Off",
        1 => "Auto",
        2 => "On",
        3 => "Red-eye reduction",
        4 => "Slow-sync",
        5 => "Red-eye reduction (Auto)",
        6 => "Red-eye reduction (On)",
        16 => "External flash",
        _ => "",
    }
}

pub fn canon_drive_mode(code: i64) -> &'static str {
    match code {
        0 => "Single",
        1 => "Continuous",
        2 => "Movie",
        3 => "Continuous, Speed Priority",
        4 => "Continuous, Low",
        5 => "Continuous, High",
        6 => "Silent Single",
        9 => "Single, Silent",
        10 => "Continuous, Silent",
        _ => "",
    }
}

pub fn canon_focus_mode(code: i64) -> &'static str {
    match code {
        0 => "One-shot AF",
        1 => "AI Servo AF",
        2 => "AI Focus AF",
        3 => "Manual Focus (3)",
        4 => "Single",
        5 => "Continuous",
        6 => "Manual Focus (6)",
        16 => "Pan Focus",
        256 => "One-shot AF (Live View)",
        257 => "AI Servo AF (Live View)",
        258 => "AI Focus AF (Live View)",
        512 => "Movie Snap Focus",
        519 => "Movie Servo AF",
        _ => "",
    }
}

pub fn canon_macro_mode(code: i64) -> &'static str {
    match code {
        1 => "Macro",
        2 => "Normal",
        _ => "",
    }
}

pub fn canon_image_stabilization(code: i64) -> &'static str {
    match code {
        0 => "Off",
        1 => "On",
        2 => "Shoot Only",
        3 => "Panning",
        4 => "Dynamic",
        256 => "Off (2)",
        257 => "On (2)",
        258 => "Shoot Only (2)",
        259 => "Panning (2)",
        260 => "Dynamic (2)",
        _ => "",
    }
}

pub fn canon_quality(code: i64) -> &'static str {
    match code {
        1 => "Economy",
        2 => "Normal",
        3 => "Fine",
        4 => "RAW",
        5 => "Superfine",
        7 => "CRAW",
        130 => "Light (RAW)",
        131 => "Standard (RAW)",
        _ => "",
    }
}

/// Scene program selected on the mode dial.
pub fn canon_easy_mode(code: i64) -> &'static str {
    match code {
        0 => "Full auto",
        1 => "Manual",
        2 => "Landscape",
        3 => "Fast shutter",
        4 => "Slow shutter",
        5 => "Night",
        6 => "Gray Scale",
        7 => "Sepia",
        8 => "Portrait",
        9 => "Sports",
        10 => "Macro",
        11 => "Black & White",
        12 => "Pan focus",
        13 => "Vivid",
        14 => "Neutral",
        15 => "Flash Off",
        16 => "Long Shutter",
        17 => "Super Macro",
        18 => "Foliage",
        19 => "Indoor",
        20 => "Fireworks",
        21 => "Beach",
        22 => "Underwater",
        23 => "Snow",
        24 => "Kids & Pets",
        25 => "Night Snapshot",
        26 => "Digital Macro",
        27 => "My Colors",
        28 => "Movie Snap",
        29 => "Super Macro 2",
        30 => "Color Accent",
        31 => "Color Swap",
        32 => "Aquarium",
        33 => "ISO 3200",
        _ => "",
    }
}

/// Delay in tenths of a second in the low 12 bits; bit 14 flags a custom
/// timer.
pub fn canon_self_timer(code: i64) -> String {
    match code {
        0 => "Off".to_string(),
        c if c < 0 => String::new(),
        c => {
            let seconds = (c & 0xfff) as f64 / 10.0;
            if c & 0x4000 != 0 {
                format!("{} s, Custom", seconds)
            } else {
                format!("{} s", seconds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Formatter tests
    // =========================================================================

    #[test]
    fn shutter_fraction_and_whole_seconds() {
        assert_eq!(shutter_speed(0.004), "1/250 s");
        assert_eq!(shutter_speed(1.0 / 60.0), "1/60 s");
        assert_eq!(shutter_speed(2.0), "2.0 s");
        assert_eq!(shutter_speed(1.0), "1.0 s");
    }

    #[test]
    fn exposure_compensation_is_signed() {
        assert_eq!(exposure_compensation(0.7), "+0.7 EV");
        assert_eq!(exposure_compensation(-1.3), "-1.3 EV");
        assert_eq!(exposure_compensation(0.0), "+0.0 EV");
    }

    #[test]
    fn apex_max_aperture() {
        // APEX 4 → f/4.0
        assert_eq!(aperture_from_apex(4.0), "f/4.0");
        assert_eq!(aperture_from_apex(1.0), "f/1.4");
    }

    #[test]
    fn focal_lengths() {
        assert_eq!(focal_length(35.0), "35.0 mm");
        assert_eq!(focal_length_35mm(52.0), "52 mm");
    }

    #[test]
    fn subject_distance_units() {
        assert_eq!(subject_distance(0.45), "45 cm");
        assert_eq!(subject_distance(3.2), "3.20 m");
    }

    #[test]
    fn digital_zoom_ratio() {
        assert_eq!(digital_zoom(1.0), "None");
        assert_eq!(digital_zoom(0.0), "None");
        assert_eq!(digital_zoom(2.0), "2.0x");
    }

    // =========================================================================
    // Table tests
    // =========================================================================

    #[test]
    fn flash_bits() {
        assert_eq!(flash(0x00), "Did not fire");
        assert_eq!(flash(0x01), "Fired");
        assert_eq!(flash(0x09), "Fired, compulsory");
        assert_eq!(flash(0x10), "Did not fire, suppressed");
        assert_eq!(flash(0x19), "Fired, auto");
        assert_eq!(flash(0x18), "Did not fire, auto");
    }

    #[test]
    fn unknown_codes_are_empty() {
        assert_eq!(metering_mode(42), "");
        assert_eq!(exposure_program(10), "");
        assert_eq!(color_space(3), "");
        assert_eq!(white_balance(2), "");
        assert_eq!(non_empty(metering_mode(42)), None);
    }

    #[test]
    fn known_codes() {
        assert_eq!(metering_mode(5), "Multi-segment");
        assert_eq!(exposure_program(3), "Aperture priority");
        assert_eq!(exposure_mode(2), "Auto bracket");
        assert_eq!(color_space(65535), "Uncalibrated");
        assert_eq!(scene_capture_type(3), "Night scene");
        assert_eq!(sensing_method(2), "One-chip color area");
        assert_eq!(gain_control(4), "High gain down");
        assert_eq!(level(2), "High");
        assert_eq!(file_source(3), "Digital Camera");
        assert_eq!(scene_type(1), "Directly photographed");
    }

    #[test]
    fn canon_setting_codes() {
        assert_eq!(canon_flash_mode(2), "On");
        assert_eq!(canon_flash_mode(16), "External flash");
        assert_eq!(canon_drive_mode(1), "Continuous");
        assert_eq!(canon_focus_mode(1), "AI Servo AF");
        assert_eq!(canon_focus_mode(519), "Movie Servo AF");
        assert_eq!(canon_macro_mode(2), "Normal");
        assert_eq!(canon_image_stabilization(257), "On (2)");
        assert_eq!(canon_quality(3), "Fine");
        assert_eq!(canon_easy_mode(8), "Portrait");
    }

    #[test]
    fn canon_not_recorded_is_empty() {
        assert_eq!(canon_flash_mode(-1), "");
        assert_eq!(canon_focus_mode(-1), "");
        assert_eq!(canon_quality(6), "");
        assert_eq!(canon_easy_mode(99), "");
        assert_eq!(canon_self_timer(-1), "");
    }

    #[test]
    fn canon_self_timer_delays() {
        assert_eq!(canon_self_timer(0), "Off");
        assert_eq!(canon_self_timer(100), "10 s");
        assert_eq!(canon_self_timer(20), "2 s");
        assert_eq!(canon_self_timer(0x4000 | 25), "2.5 s, Custom");
    }

    #[test]
    fn canon_levels() {
        assert_eq!(canon_level("0"), "Normal");
        assert_eq!(canon_level("1"), "Low");
        assert_eq!(canon_level(" HIGH "), "High");
        assert_eq!(canon_level("Unknown (3)"), "Unknown (3)");
    }
}
