//! GPS removal from JPEG files.
//!
//! The GPS sub-IFD pointer in IFD0 of the first `Exif` APP1 segment is
//! overwritten with zeros. Nothing else moves: the segment length, every
//! other entry and every offset inside the TIFF block stay byte-identical,
//! so the file remains a valid JPEG of the same size. The orphaned GPS IFD
//! data is left in place but is no longer reachable from any directory.

use crate::metadata::container::jpeg_exif_range;
use crate::metadata::tiff::{ENTRY_SIZE, GPS_IFD_POINTER, Tiff};
use std::io;
use std::path::Path;

/// What [`strip_gps`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripOutcome {
    /// Input does not start with the JPEG start-of-image marker.
    NotJpeg,
    /// No `Exif` APP1 segment with a readable TIFF header.
    NoExif,
    /// EXIF present but IFD0 has no GPS pointer.
    NoGps,
    /// Number of IFD0 entries zeroed.
    Stripped(usize),
}

/// Zero every GPS pointer entry of IFD0 in a JPEG held in memory.
///
/// Never panics and never changes the buffer length, whatever the input.
pub fn strip_gps_in_place(data: &mut [u8]) -> StripOutcome {
    if !crate::metadata::container::is_jpeg(data) {
        return StripOutcome::NotJpeg;
    }
    let Some(range) = jpeg_exif_range(data) else {
        return StripOutcome::NoExif;
    };

    let positions: Vec<usize> = {
        let Some(tiff) = Tiff::parse(&data[range.clone()]) else {
            return StripOutcome::NoExif;
        };
        let Some(ifd0) = tiff.ifd0_offset() else {
            return StripOutcome::NoExif;
        };
        tiff.entries(ifd0)
            .into_iter()
            .filter(|e| e.tag == GPS_IFD_POINTER)
            .map(|e| range.start + e.position)
            .collect()
    };

    if positions.is_empty() {
        return StripOutcome::NoGps;
    }
    for &pos in &positions {
        // `entries` only yields entries that fit inside the TIFF block
        if let Some(entry) = data.get_mut(pos..pos + ENTRY_SIZE) {
            entry.fill(0);
        }
    }
    StripOutcome::Stripped(positions.len())
}

/// Strip GPS from the JPEG at `path`, rewriting it only when an entry was
/// zeroed.
///
/// Files that are not JPEG or carry no GPS pointer are left untouched and
/// reported through the outcome; only read and write failures are errors.
pub fn strip_gps(path: &Path) -> io::Result<StripOutcome> {
    let mut data = std::fs::read(path)?;
    let outcome = strip_gps_in_place(&mut data);
    match outcome {
        StripOutcome::Stripped(n) => {
            std::fs::write(path, &data)?;
            tracing::debug!(path = %path.display(), entries = n, "stripped GPS");
        }
        other => {
            tracing::debug!(path = %path.display(), outcome = ?other, "no GPS to strip");
        }
    }
    Ok(outcome)
}
