//! Locating the EXIF (TIFF) block inside image containers.
//!
//! - JPEG: the first APP1 segment whose payload starts with `Exif\0\0`.
//! - PNG: the `eXIf` chunk.
//! - A file that is itself a TIFF stream.
//!
//! All walks are bounds-checked; truncated or malformed input yields `None`
//! rather than a panic.

use std::ops::Range;

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const APP1: u8 = 0xE1;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// One length-prefixed JPEG marker segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    /// Bytes after the two length bytes, up to the end of the segment.
    pub payload: Range<usize>,
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&JPEG_SOI)
}

/// Iterate the header segments of a JPEG stream.
///
/// Stops at start-of-scan, end-of-image, a byte that is not a marker, or a
/// segment whose declared length runs past the buffer.
pub fn jpeg_segments(data: &[u8]) -> JpegSegments<'_> {
    JpegSegments {
        data,
        pos: if is_jpeg(data) { 2 } else { data.len() },
    }
}

pub struct JpegSegments<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Iterator for JpegSegments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let data = self.data;
        loop {
            if self.pos + 1 >= data.len() || data[self.pos] != 0xFF {
                return None;
            }
            let marker = data[self.pos + 1];
            match marker {
                // Fill byte before a marker
                0xFF => {
                    self.pos += 1;
                    continue;
                }
                EOI | SOS => return None,
                // Markers without a length field
                0x01 | 0xD0..=0xD7 => {
                    self.pos += 2;
                    continue;
                }
                _ => {}
            }
            if self.pos + 4 > data.len() {
                return None;
            }
            let seg_len = u16::from_be_bytes([data[self.pos + 2], data[self.pos + 3]]) as usize;
            let end = self.pos + 2 + seg_len;
            if seg_len < 2 || end > data.len() {
                return None;
            }
            let segment = Segment {
                marker,
                payload: self.pos + 4..end,
            };
            self.pos = end;
            return Some(segment);
        }
    }
}

/// Range of the TIFF stream inside the first `Exif\0\0` APP1 segment.
pub fn jpeg_exif_range(data: &[u8]) -> Option<Range<usize>> {
    jpeg_segments(data)
        .find(|seg| seg.marker == APP1 && data[seg.payload.clone()].starts_with(EXIF_HEADER))
        .map(|seg| seg.payload.start + EXIF_HEADER.len()..seg.payload.end)
}

/// Range of the `eXIf` chunk data in a PNG stream.
///
/// CRCs are not verified.
pub fn png_exif_range(data: &[u8]) -> Option<Range<usize>> {
    if !data.starts_with(PNG_SIGNATURE) {
        return None;
    }
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let start = pos + 8;
        let end = start.checked_add(len)?;
        if end > data.len() {
            return None;
        }
        match kind {
            b"eXIf" => return Some(start..end),
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        // data + CRC
        pos = end + 4;
    }
    None
}

pub fn is_tiff(data: &[u8]) -> bool {
    data.len() >= 4 && (data.starts_with(b"II*\0") || data.starts_with(b"MM\0*"))
}

/// Find the TIFF stream carrying EXIF data in any supported container.
pub fn exif_block(data: &[u8]) -> Option<&[u8]> {
    if is_jpeg(data) {
        return jpeg_exif_range(data).map(|r| &data[r]);
    }
    if let Some(range) = png_exif_range(data) {
        return Some(&data[range]);
    }
    if is_tiff(data) {
        return Some(data);
    }
    None
}
