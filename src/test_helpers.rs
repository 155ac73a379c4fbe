//! Shared test utilities for the lightbox test suite.
//!
//! Provides synthetic image fixtures and a [`TiffBuilder`] that assembles
//! EXIF blocks byte by byte, so metadata and GPS tests never depend on
//! binary files checked into the repo.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tiff = TiffBuilder::little_endian()
//!     .ascii(0x010F, "Canon")
//!     .exif()
//!     .rational(0x829A, 1, 250)
//!     .with_gps()
//!     .build();
//! let jpeg = jpeg_with_exif(&tiff, 64, 48);
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::Path;

use crate::metadata::tiff::{EXIF_IFD_POINTER, GPS_IFD_POINTER};

// =========================================================================
// Image fixtures
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Encode a gradient PNG in memory.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

pub fn write_test_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, png_bytes(width, height)).unwrap();
}

/// Insert an `Exif\0\0` APP1 segment carrying `tiff` right after SOI.
pub fn jpeg_with_exif(tiff: &[u8], width: u32, height: u32) -> Vec<u8> {
    let jpeg = jpeg_bytes(width, height);
    let seg_len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + seg_len as usize + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn write_jpeg_with_exif(path: &Path, tiff: &[u8], width: u32, height: u32) {
    std::fs::write(path, jpeg_with_exif(tiff, width, height)).unwrap();
}

/// Insert an `eXIf` chunk right after IHDR. The CRC is left zeroed.
pub fn png_with_exif(tiff: &[u8], width: u32, height: u32) -> Vec<u8> {
    let png = png_bytes(width, height);
    // signature (8) + IHDR chunk (4 + 4 + 13 + 4)
    let split = 8 + 25;
    let mut out = Vec::with_capacity(png.len() + tiff.len() + 12);
    out.extend_from_slice(&png[..split]);
    out.extend_from_slice(&(tiff.len() as u32).to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&png[split..]);
    out
}

// =========================================================================
// TIFF builder
// =========================================================================

#[derive(Debug, Clone)]
pub enum Value {
    Ascii(String),
    Short(u16),
    Long(u32),
    Rational(u32, u32),
    SRational(i32, i32),
    Undefined(Vec<u8>),
}

impl Value {
    /// (type, count, payload) in the given byte order.
    fn encode(&self, big_endian: bool) -> (u16, u32, Vec<u8>) {
        let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        match self {
            Value::Ascii(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                (2, bytes.len() as u32, bytes)
            }
            Value::Short(v) => (3, 1, u16b(*v).to_vec()),
            Value::Long(v) => (4, 1, u32b(*v).to_vec()),
            Value::Rational(n, d) => (5, 1, [u32b(*n), u32b(*d)].concat()),
            Value::SRational(n, d) => (10, 1, [u32b(*n as u32), u32b(*d as u32)].concat()),
            Value::Undefined(bytes) => (7, bytes.len() as u32, bytes.clone()),
        }
    }
}

/// Assembles a TIFF stream with IFD0, an optional Exif sub-IFD and an
/// optional GPS sub-IFD.
#[derive(Debug, Clone)]
pub struct TiffBuilder {
    big_endian: bool,
    ifd0: Vec<(u16, Value)>,
    exif: Vec<(u16, Value)>,
    into_exif: bool,
    gps: bool,
}

fn padded(len: usize) -> usize {
    len + (len % 2)
}

fn ifd_len(entries: &[(u16, Value)], big_endian: bool) -> usize {
    let data: usize = entries
        .iter()
        .map(|(_, v)| v.encode(big_endian).2.len())
        .filter(|&len| len > 4)
        .map(padded)
        .sum();
    2 + entries.len() * 12 + 4 + data
}

impl TiffBuilder {
    pub fn little_endian() -> Self {
        Self {
            big_endian: false,
            ifd0: Vec::new(),
            exif: Vec::new(),
            into_exif: false,
            gps: false,
        }
    }

    pub fn big_endian() -> Self {
        Self {
            big_endian: true,
            ..Self::little_endian()
        }
    }

    /// Entries added after this call go to the Exif sub-IFD.
    pub fn exif(mut self) -> Self {
        self.into_exif = true;
        self
    }

    /// Add a GPS sub-IFD and its IFD0 pointer.
    pub fn with_gps(mut self) -> Self {
        self.gps = true;
        self
    }

    pub fn entry(mut self, tag: u16, value: Value) -> Self {
        if self.into_exif {
            self.exif.push((tag, value));
        } else {
            self.ifd0.push((tag, value));
        }
        self
    }

    pub fn ascii(self, tag: u16, s: &str) -> Self {
        self.entry(tag, Value::Ascii(s.to_string()))
    }

    pub fn short(self, tag: u16, v: u16) -> Self {
        self.entry(tag, Value::Short(v))
    }

    pub fn long(self, tag: u16, v: u32) -> Self {
        self.entry(tag, Value::Long(v))
    }

    pub fn rational(self, tag: u16, num: u32, den: u32) -> Self {
        self.entry(tag, Value::Rational(num, den))
    }

    pub fn srational(self, tag: u16, num: i32, den: i32) -> Self {
        self.entry(tag, Value::SRational(num, den))
    }

    pub fn undefined(self, tag: u16, bytes: &[u8]) -> Self {
        self.entry(tag, Value::Undefined(bytes.to_vec()))
    }

    fn serialize_ifd(&self, entries: &[(u16, Value)], base: usize) -> Vec<u8> {
        let be = self.big_endian;
        let u16b = |v: u16| if be { v.to_be_bytes() } else { v.to_le_bytes() };
        let u32b = |v: u32| if be { v.to_be_bytes() } else { v.to_le_bytes() };

        let mut table = Vec::new();
        let mut data = Vec::new();
        let data_start = base + 2 + entries.len() * 12 + 4;
        table.extend_from_slice(&u16b(entries.len() as u16));
        for (tag, value) in entries {
            let (kind, count, payload) = value.encode(be);
            table.extend_from_slice(&u16b(*tag));
            table.extend_from_slice(&u16b(kind));
            table.extend_from_slice(&u32b(count));
            if payload.len() <= 4 {
                let mut inline = payload.clone();
                inline.resize(4, 0);
                table.extend_from_slice(&inline);
            } else {
                table.extend_from_slice(&u32b((data_start + data.len()) as u32));
                data.extend_from_slice(&payload);
                if payload.len() % 2 == 1 {
                    data.push(0);
                }
            }
        }
        table.extend_from_slice(&u32b(0));
        table.extend_from_slice(&data);
        table
    }

    pub fn build(&self) -> Vec<u8> {
        let be = self.big_endian;
        let gps_entries = vec![
            (0x0000, Value::Undefined(vec![2, 3, 0, 0])),
            (0x0001, Value::Ascii("N".to_string())),
            (0x0002, Value::Rational(48, 1)),
        ];

        let mut ifd0 = self.ifd0.clone();
        if !self.exif.is_empty() {
            ifd0.push((EXIF_IFD_POINTER, Value::Long(0)));
        }
        if self.gps {
            ifd0.push((GPS_IFD_POINTER, Value::Long(0)));
        }

        let ifd0_offset = 8;
        let exif_offset = ifd0_offset + ifd_len(&ifd0, be);
        let gps_offset = exif_offset
            + if self.exif.is_empty() {
                0
            } else {
                ifd_len(&self.exif, be)
            };
        for (tag, value) in ifd0.iter_mut() {
            match *tag {
                EXIF_IFD_POINTER => *value = Value::Long(exif_offset as u32),
                GPS_IFD_POINTER => *value = Value::Long(gps_offset as u32),
                _ => {}
            }
        }

        let mut out = Vec::new();
        if be {
            out.extend_from_slice(b"MM\0*");
            out.extend_from_slice(&(ifd0_offset as u32).to_be_bytes());
        } else {
            out.extend_from_slice(b"II*\0");
            out.extend_from_slice(&(ifd0_offset as u32).to_le_bytes());
        }
        out.extend(self.serialize_ifd(&ifd0, ifd0_offset));
        if !self.exif.is_empty() {
            out.extend(self.serialize_ifd(&self.exif, exif_offset));
        }
        if self.gps {
            out.extend(self.serialize_ifd(&gps_entries, gps_offset));
        }
        out
    }
}

/// A minimal EXIF block with camera make and a GPS sub-IFD.
pub fn gps_tiff() -> Vec<u8> {
    TiffBuilder::little_endian()
        .ascii(0x010F, "Canon")
        .with_gps()
        .build()
}

/// Locate the 12-byte IFD0 entry for `tag` in a JPEG produced by
/// [`jpeg_with_exif`]. Returns the absolute offset of the entry.
pub fn find_ifd0_entry(jpeg: &[u8], tag: u16) -> Option<usize> {
    let tiff_start = 2 + 4 + 6;
    let big_endian = &jpeg[tiff_start..tiff_start + 2] == b"MM";
    let rd16 = |o: usize| {
        let b = [jpeg[o], jpeg[o + 1]];
        if big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }
    };
    let ifd0 = tiff_start + 8;
    let count = rd16(ifd0) as usize;
    (0..count)
        .map(|i| ifd0 + 2 + i * 12)
        .find(|&pos| rd16(pos) == tag)
}
