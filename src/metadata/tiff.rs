//! Minimal TIFF/IFD reader for EXIF blocks.
//!
//! Handles both byte orders, IFD entries of the common value types and
//! values stored inline (four bytes or fewer) or at an offset. Every read is
//! bounds-checked and returns `None` past the end of the buffer.

/// IFD0 tag pointing at the Exif sub-IFD.
pub const EXIF_IFD_POINTER: u16 = 0x8769;
/// IFD0 tag pointing at the GPS sub-IFD.
pub const GPS_IFD_POINTER: u16 = 0x8825;

/// Bytes per IFD entry: tag, type, count, value/offset.
pub const ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// One 12-byte IFD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub tag: u16,
    pub kind: u16,
    pub count: u32,
    /// Offset of the entry itself within the TIFF stream.
    pub position: usize,
}

impl Entry {
    fn value_field(&self) -> usize {
        self.position + 8
    }
}

/// Bytes per component for a TIFF field type.
fn type_size(kind: u16) -> Option<usize> {
    match kind {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// A TIFF stream borrowed from a larger buffer.
#[derive(Debug, Clone, Copy)]
pub struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Tiff<'a> {
    /// Validate the header (`II*\0` or `MM\0*`).
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        let tiff = Self { data, order };
        (tiff.read_u16(2)? == 42).then_some(tiff)
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset.checked_add(2)?)?;
        Some(match self.order {
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
        })
    }

    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset.checked_add(4)?)?;
        Some(match self.order {
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    pub fn ifd0_offset(&self) -> Option<usize> {
        self.read_u32(4).map(|o| o as usize)
    }

    /// Entries of the IFD at `offset`, cut short where the buffer ends.
    pub fn entries(&self, offset: usize) -> Vec<Entry> {
        let Some(count) = self.read_u16(offset) else {
            return Vec::new();
        };
        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let position = offset + 2 + i * ENTRY_SIZE;
            if position + ENTRY_SIZE > self.data.len() {
                break;
            }
            let (Some(tag), Some(kind), Some(count)) = (
                self.read_u16(position),
                self.read_u16(position + 2),
                self.read_u32(position + 4),
            ) else {
                break;
            };
            entries.push(Entry {
                tag,
                kind,
                count,
                position,
            });
        }
        entries
    }

    /// Raw value bytes of an entry, inline or at its offset.
    pub fn value_bytes(&self, entry: &Entry) -> Option<&'a [u8]> {
        let len = type_size(entry.kind)?.checked_mul(entry.count as usize)?;
        let start = if len <= 4 {
            entry.value_field()
        } else {
            self.read_u32(entry.value_field())? as usize
        };
        self.data.get(start..start.checked_add(len)?)
    }

    /// Integer component `index` of a BYTE, UNDEFINED, SHORT or LONG entry.
    pub fn uint(&self, entry: &Entry, index: usize) -> Option<u32> {
        let bytes = self.value_bytes(entry)?;
        match entry.kind {
            1 | 7 => bytes.get(index).map(|&b| b as u32),
            3 => {
                let sub = Tiff {
                    data: bytes,
                    order: self.order,
                };
                sub.read_u16(index * 2).map(u32::from)
            }
            4 => {
                let sub = Tiff {
                    data: bytes,
                    order: self.order,
                };
                sub.read_u32(index * 4)
            }
            _ => None,
        }
    }

    /// First RATIONAL or SRATIONAL component as a float. Zero denominators
    /// yield `None`.
    pub fn rational(&self, entry: &Entry) -> Option<f64> {
        self.rational_at(entry, 0)
    }

    pub fn rational_at(&self, entry: &Entry, index: usize) -> Option<f64> {
        let bytes = self.value_bytes(entry)?;
        let sub = Tiff {
            data: bytes,
            order: self.order,
        };
        let num = sub.read_u32(index * 8)?;
        let den = sub.read_u32(index * 8 + 4)?;
        if den == 0 {
            return None;
        }
        match entry.kind {
            5 => Some(num as f64 / den as f64),
            10 => Some(num as i32 as f64 / den as i32 as f64),
            _ => None,
        }
    }

    /// Raw numerator/denominator of the first RATIONAL component.
    pub fn rational_parts(&self, entry: &Entry) -> Option<(u32, u32)> {
        if entry.kind != 5 {
            return None;
        }
        let bytes = self.value_bytes(entry)?;
        let sub = Tiff {
            data: bytes,
            order: self.order,
        };
        Some((sub.read_u32(0)?, sub.read_u32(4)?))
    }

    /// ASCII value, trimmed of NULs and whitespace. Empty strings yield `None`.
    pub fn ascii(&self, entry: &Entry) -> Option<String> {
        if entry.kind != 2 && entry.kind != 7 {
            return None;
        }
        let bytes = self.value_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TiffBuilder;
    use proptest::prelude::*;

    #[test]
    fn rejects_bad_header() {
        assert!(Tiff::parse(b"XX*\0\0\0\0\0").is_none());
        assert!(Tiff::parse(b"II\x2b\0\x08\0\0\0").is_none());
        assert!(Tiff::parse(b"I").is_none());
    }

    #[test]
    fn reads_little_and_big_endian_entries() {
        for builder in [TiffBuilder::little_endian(), TiffBuilder::big_endian()] {
            let data = builder
                .ascii(0x010F, "NIKON CORPORATION")
                .short(0x0112, 6)
                .rational(0x829A, 1, 250)
                .build();
            let tiff = Tiff::parse(&data).unwrap();
            let entries = tiff.entries(tiff.ifd0_offset().unwrap());
            assert_eq!(entries.len(), 3);

            let make = entries.iter().find(|e| e.tag == 0x010F).unwrap();
            assert_eq!(tiff.ascii(make).as_deref(), Some("NIKON CORPORATION"));
            let orientation = entries.iter().find(|e| e.tag == 0x0112).unwrap();
            assert_eq!(tiff.uint(orientation, 0), Some(6));
            let exposure = entries.iter().find(|e| e.tag == 0x829A).unwrap();
            assert_eq!(tiff.rational(exposure), Some(0.004));
            assert_eq!(tiff.rational_parts(exposure), Some((1, 250)));
        }
    }

    #[test]
    fn signed_rational() {
        let data = TiffBuilder::little_endian()
            .srational(0x9204, -2, 3)
            .build();
        let tiff = Tiff::parse(&data).unwrap();
        let entry = tiff.entries(8)[0];
        let value = tiff.rational(&entry).unwrap();
        assert!((value + 0.6667).abs() < 0.001);
    }

    #[test]
    fn zero_denominator_is_none() {
        let data = TiffBuilder::little_endian().rational(0x920A, 5, 0).build();
        let tiff = Tiff::parse(&data).unwrap();
        assert_eq!(tiff.rational(&tiff.entries(8)[0]), None);
    }

    #[test]
    fn entry_count_past_end_is_truncated() {
        let mut data = TiffBuilder::little_endian().short(0x0112, 1).build();
        // Claim 50 entries
        data[8] = 50;
        let tiff = Tiff::parse(&data).unwrap();
        assert!(tiff.entries(8).len() < 50);
    }

    #[test]
    fn value_offset_past_end_is_none() {
        let mut data = TiffBuilder::little_endian().ascii(0x010F, "A long camera make").build();
        let tiff = Tiff::parse(&data).unwrap();
        let entry = tiff.entries(8)[0];
        let field = entry.position + 8;
        data[field..field + 4].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());
        let tiff = Tiff::parse(&data).unwrap();
        assert_eq!(tiff.ascii(&entry), None);
    }

    proptest! {
        #[test]
        fn readers_never_panic_on_arbitrary_input(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            offset in 0usize..300,
        ) {
            let Some(tiff) = Tiff::parse(&data) else { return Ok(()); };
            let start = tiff.ifd0_offset().unwrap_or(offset);
            for ifd in [start, offset] {
                for entry in tiff.entries(ifd) {
                    let _ = tiff.value_bytes(&entry);
                    let _ = tiff.ascii(&entry);
                    let _ = tiff.rational_parts(&entry);
                    for index in 0..4 {
                        let _ = tiff.uint(&entry, index);
                        let _ = tiff.rational_at(&entry, index);
                    }
                }
            }
            let _ = tiff.read_u16(offset);
            let _ = tiff.read_u32(offset);
        }
    }
}
