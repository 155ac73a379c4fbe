//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which derivative to create) and the [`backend`](super::backend)
//! (which does the pixel work), so tests can swap in a mock backend.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 85). Clamped on construction.
//! - [`OutputFormat`]: JPEG at a quality, or lossless PNG.
//! - [`ResizeParams`]: source, output path, width bound and output format.
//! - [`PlaceholderParams`]: a colour grid to upscale into a small PNG.

use super::calculations::PlaceholderGrid;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Encoding of a generated derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg(Quality),
    Png,
}

impl OutputFormat {
    /// PNG sources stay PNG (transparency survives), everything else becomes JPEG.
    pub fn for_source(source_extension: &str, quality: Quality) -> Self {
        if source_extension.eq_ignore_ascii_case("png") {
            Self::Png
        } else {
            Self::Jpeg(quality)
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg(_) => "jpg",
            Self::Png => "png",
        }
    }
}

/// Parameters for a width-bounded resize.
///
/// The height is derived from the oriented source aspect ratio at execution
/// time; sources narrower than `max_width` keep their size.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: u32,
    pub format: OutputFormat,
}

/// Parameters for rendering a placeholder grid to PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderParams {
    pub output: PathBuf,
    pub grid: PlaceholderGrid,
    /// Edge length of the square output.
    pub size: u32,
}
