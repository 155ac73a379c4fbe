//! Pure calculation functions for derivative dimensions and placeholder grids.
//!
//! All functions here are pure and testable without any I/O or images.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Cells per side of the placeholder grid.
pub const GRID_SIZE: u32 = 4;

/// Bytes in an encoded grid: one RGB triple per cell, row-major.
pub const GRID_BYTES: usize = (GRID_SIZE * GRID_SIZE * 3) as usize;

/// Channel value of the flat fallback placeholder.
pub const NEUTRAL_GRAY: u8 = 128;

/// Calculate output dimensions for a width-bounded resize.
///
/// Sources no wider than `max_width` are returned unchanged (no upscaling).
/// Otherwise the width becomes `max_width` and the height follows the source
/// aspect ratio, never dropping below one pixel.
///
/// # Examples
/// ```
/// # use lightbox::imaging::bounded_dimensions;
/// assert_eq!(bounded_dimensions((1200, 900), 300), (300, 225));
/// assert_eq!(bounded_dimensions((200, 100), 300), (200, 100));
/// ```
pub fn bounded_dimensions(source: (u32, u32), max_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w <= max_width || src_w == 0 {
        return source;
    }
    let h = (src_h as f64 * max_width as f64 / src_w as f64).round() as u32;
    (max_width, h.max(1))
}

/// A 4x4 grid of average colours, the compact form of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderGrid {
    cells: [[u8; 3]; (GRID_SIZE * GRID_SIZE) as usize],
}

impl PlaceholderGrid {
    /// Flat mid-gray grid used when an encoding cannot be decoded.
    pub fn neutral() -> Self {
        Self {
            cells: [[NEUTRAL_GRAY; 3]; (GRID_SIZE * GRID_SIZE) as usize],
        }
    }

    pub fn cell(&self, x: u32, y: u32) -> [u8; 3] {
        self.cells[(y * GRID_SIZE + x) as usize]
    }

    #[cfg(test)]
    pub(crate) fn with_cell(mut self, x: u32, y: u32, rgb: [u8; 3]) -> Self {
        self.cells[(y * GRID_SIZE + x) as usize] = rgb;
        self
    }

    /// Base64 of the 48 grid bytes.
    pub fn encode(&self) -> String {
        let bytes: Vec<u8> = self.cells.iter().flatten().copied().collect();
        STANDARD.encode(bytes)
    }

    /// Decode an encoding produced by [`encode`](Self::encode).
    ///
    /// Returns `None` for invalid base64 or fewer than 48 bytes. Extra
    /// trailing bytes are ignored.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = STANDARD.decode(encoded.trim()).ok()?;
        if bytes.len() < GRID_BYTES {
            return None;
        }
        let mut grid = Self::neutral();
        for (cell, rgb) in grid.cells.iter_mut().zip(bytes.chunks_exact(3)) {
            cell.copy_from_slice(rgb);
        }
        Some(grid)
    }

    /// Decode, falling back to the neutral grid.
    pub fn decode_or_neutral(encoded: Option<&str>) -> Self {
        encoded.and_then(Self::decode).unwrap_or_else(Self::neutral)
    }
}

/// Pixel span `[start, end)` covered by grid cell `index` along an axis of
/// `extent` pixels. Always at least one pixel wide when `extent > 0`.
fn cell_span(index: u32, extent: u32) -> (u32, u32) {
    let start = (index * extent / GRID_SIZE).min(extent.saturating_sub(1));
    let end = ((index + 1) * extent / GRID_SIZE).clamp(start + 1, extent.max(1));
    (start, end)
}

/// Box-average an interleaved RGB8 buffer down to a [`PlaceholderGrid`].
///
/// `rgb.len()` must be `width * height * 3`; an empty image yields the
/// neutral grid.
pub fn average_grid(rgb: &[u8], width: u32, height: u32) -> PlaceholderGrid {
    if width == 0 || height == 0 || rgb.len() < (width * height * 3) as usize {
        return PlaceholderGrid::neutral();
    }
    let mut grid = PlaceholderGrid::neutral();
    for cy in 0..GRID_SIZE {
        let (y0, y1) = cell_span(cy, height);
        for cx in 0..GRID_SIZE {
            let (x0, x1) = cell_span(cx, width);
            let mut sums = [0u64; 3];
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = ((y * width + x) * 3) as usize;
                    sums[0] += rgb[i] as u64;
                    sums[1] += rgb[i + 1] as u64;
                    sums[2] += rgb[i + 2] as u64;
                    count += 1;
                }
            }
            grid.cells[(cy * GRID_SIZE + cx) as usize] = [
                (sums[0] / count) as u8,
                (sums[1] / count) as u8,
                (sums[2] / count) as u8,
            ];
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // bounded_dimensions tests
    // =========================================================================

    #[test]
    fn bounded_scales_wide_source() {
        assert_eq!(bounded_dimensions((1600, 1200), 800), (800, 600));
    }

    #[test]
    fn bounded_keeps_narrow_source() {
        assert_eq!(bounded_dimensions((250, 400), 300), (250, 400));
    }

    #[test]
    fn bounded_exact_width_is_unchanged() {
        assert_eq!(bounded_dimensions((300, 200), 300), (300, 200));
    }

    #[test]
    fn bounded_extreme_panorama_keeps_one_pixel() {
        assert_eq!(bounded_dimensions((10_000, 10), 300), (300, 1));
    }

    #[test]
    fn bounded_portrait_rounds_height() {
        // 1000x1333 at 300 → 399.9 → 400
        assert_eq!(bounded_dimensions((1000, 1333), 300), (300, 400));
    }

    // =========================================================================
    // PlaceholderGrid tests
    // =========================================================================

    #[test]
    fn encoding_is_48_bytes_of_base64() {
        let encoded = PlaceholderGrid::neutral().encode();
        assert_eq!(STANDARD.decode(&encoded).unwrap().len(), GRID_BYTES);
        assert_eq!(encoded.len(), 64);
    }

    #[test]
    fn decode_rejects_short_payload() {
        let short = STANDARD.encode([1u8; 47]);
        assert_eq!(PlaceholderGrid::decode(&short), None);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert_eq!(PlaceholderGrid::decode("not*base64!"), None);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes: Vec<u8> = (0..GRID_BYTES as u8).collect();
        bytes.extend_from_slice(&[9, 9, 9]);
        let grid = PlaceholderGrid::decode(&STANDARD.encode(&bytes)).unwrap();
        assert_eq!(grid.cell(0, 0), [0, 1, 2]);
        assert_eq!(grid.cell(3, 3), [45, 46, 47]);
    }

    #[test]
    fn edited_cell_survives_encoding() {
        let grid = PlaceholderGrid::neutral().with_cell(2, 1, [255, 0, 10]);
        let back = PlaceholderGrid::decode(&grid.encode()).unwrap();
        assert_eq!(back.cell(2, 1), [255, 0, 10]);
        assert_eq!(back.cell(1, 2), [NEUTRAL_GRAY; 3]);
        assert_eq!(back, grid);
    }

    #[test]
    fn decode_or_neutral_falls_back() {
        assert_eq!(
            PlaceholderGrid::decode_or_neutral(Some("garbage")),
            PlaceholderGrid::neutral()
        );
        assert_eq!(
            PlaceholderGrid::decode_or_neutral(None),
            PlaceholderGrid::neutral()
        );
    }

    // =========================================================================
    // average_grid tests
    // =========================================================================

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        rgb.iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect()
    }

    #[test]
    fn solid_image_averages_to_its_colour() {
        let grid = average_grid(&solid(40, 30, [10, 200, 30]), 40, 30);
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                assert_eq!(grid.cell(x, y), [10, 200, 30]);
            }
        }
    }

    #[test]
    fn left_and_right_halves_stay_separate() {
        let (w, h) = (8, 8);
        let mut rgb = Vec::new();
        for _y in 0..h {
            for x in 0..w {
                rgb.extend_from_slice(if x < 4 { &[0, 0, 0] } else { &[255, 255, 255] });
            }
        }
        let grid = average_grid(&rgb, w, h);
        assert_eq!(grid.cell(0, 0), [0, 0, 0]);
        assert_eq!(grid.cell(1, 2), [0, 0, 0]);
        assert_eq!(grid.cell(2, 1), [255, 255, 255]);
        assert_eq!(grid.cell(3, 3), [255, 255, 255]);
    }

    #[test]
    fn tiny_image_still_fills_every_cell() {
        let grid = average_grid(&solid(1, 1, [7, 8, 9]), 1, 1);
        assert_eq!(grid.cell(3, 3), [7, 8, 9]);
    }

    #[test]
    fn empty_image_is_neutral() {
        assert_eq!(average_grid(&[], 0, 0), PlaceholderGrid::neutral());
    }
}
