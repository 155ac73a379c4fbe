//! CLI output formatting.
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Scan #1 finished
//!     2 folders, 5 added, 1 skipped, GPS stripped from 3
//! ```
//!
//! ## Tree
//!
//! ```text
//! 001 Home (4 photos)
//! 002 Trips
//!     001 Paris (12 photos, 2 hidden)
//! ```
//!
//! ## EXIF
//!
//! ```text
//! IMG_0001.JPG (exiftool)
//!     Taken:       2023-08-14 17:45:02
//!     aperture:    f/2.8
//!     camera make: Canon
//! ```

use crate::derivatives::CacheStats;
use crate::jobs::ScanState;
use crate::metadata::{Extraction, format_datetime};
use crate::privacy::StripOutcome;
use crate::scan::CleanReport;
use crate::types::{CatalogCounts, FolderNode};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size with one decimal above 1 KiB.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Scans
// ============================================================================

pub fn format_scan_state(id: u64, state: &ScanState) -> Vec<String> {
    match state {
        ScanState::Running => vec![format!("Scan #{} running", id)],
        ScanState::Finished(report) => vec![
            format!("Scan #{} finished", id),
            format!("{}{}", indent(1), report),
        ],
        ScanState::Failed(error) => vec![
            format!("Scan #{} failed", id),
            format!("{}{}", indent(1), error),
        ],
    }
}

pub fn print_scan_state(id: u64, state: &ScanState) {
    print_lines(format_scan_state(id, state));
}

pub fn format_clean_report(report: &CleanReport) -> Vec<String> {
    vec![format!("Cleaned: {}", report)]
}

pub fn print_clean_report(report: &CleanReport) {
    print_lines(format_clean_report(report));
}

// ============================================================================
// Catalog
// ============================================================================

fn folder_header(index: usize, node: &FolderNode) -> String {
    let head = format!("{} {}", format_index(index), node.name);
    match (node.photos, node.hidden) {
        (0, _) => head,
        (n, 0) => format!("{} ({} photos)", head, n),
        (n, h) => format!("{} ({} photos, {} hidden)", head, n, h),
    }
}

fn walk_tree(nodes: &[FolderNode], depth: usize, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        lines.push(format!("{}{}", indent(depth), folder_header(i + 1, node)));
        walk_tree(&node.children, depth + 1, lines);
    }
}

/// Folder tree with positional indices per sibling level.
pub fn format_folder_tree(nodes: &[FolderNode]) -> Vec<String> {
    let mut lines = Vec::new();
    walk_tree(nodes, 0, &mut lines);
    if lines.is_empty() {
        lines.push("(no folders)".to_string());
    }
    lines
}

pub fn print_folder_tree(nodes: &[FolderNode]) {
    print_lines(format_folder_tree(nodes));
}

pub fn format_counts(counts: &CatalogCounts) -> Vec<String> {
    vec![
        "Catalog".to_string(),
        format!("{}Folders: {}", indent(1), counts.folders),
        format!(
            "{}Photos:  {} ({} hidden)",
            indent(1),
            counts.photos,
            counts.hidden
        ),
        format!("{}Size:    {}", indent(1), format_bytes(counts.total_bytes)),
    ]
}

pub fn print_counts(counts: &CatalogCounts) {
    print_lines(format_counts(counts));
}

// ============================================================================
// Metadata and privacy
// ============================================================================

/// Every present metadata field, sorted by name, with the capture time first.
pub fn format_exif(name: &str, codec: &str, extraction: &Extraction) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", name, codec)];
    let mut fields: Vec<(String, String)> = Vec::new();
    if let Some(taken) = extraction.taken_at {
        fields.push(("Taken".to_string(), format_datetime(taken)));
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(&extraction.info) {
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in entries {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            fields.push((key.replace('_', " "), value));
        }
    }
    if fields.is_empty() {
        lines.push(format!("{}(no metadata)", indent(1)));
        return lines;
    }
    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 1;
    for (key, value) in fields {
        lines.push(format!(
            "{}{:<width$} {}",
            indent(1),
            format!("{}:", key),
            value,
            width = width
        ));
    }
    lines
}

pub fn print_exif(name: &str, codec: &str, extraction: &Extraction) {
    print_lines(format_exif(name, codec, extraction));
}

pub fn format_strip_outcome(name: &str, outcome: StripOutcome) -> String {
    match outcome {
        StripOutcome::NotJpeg => format!("{}: not a JPEG, unchanged", name),
        StripOutcome::NoExif => format!("{}: no EXIF, unchanged", name),
        StripOutcome::NoGps => format!("{}: no GPS data, unchanged", name),
        StripOutcome::Stripped(n) => format!("{}: removed {} GPS pointer(s)", name, n),
    }
}

// ============================================================================
// Derivatives
// ============================================================================

pub fn format_cache_stats(stats: &CacheStats) -> String {
    format!("Cache: {}", stats)
}
