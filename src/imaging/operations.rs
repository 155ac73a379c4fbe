//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! derivative spec, compute parameters and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::PlaceholderGrid;
use super::params::{OutputFormat, PlaceholderParams, Quality, ResizeParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Width bound and encoding quality of one derivative tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub max_width: u32,
    pub quality: Quality,
}

/// Lower-cased extension of a path, empty when there is none.
pub fn source_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Plan a thumbnail resize without executing it.
pub fn plan_thumbnail(source: &Path, output: &Path, spec: &ThumbnailSpec) -> ResizeParams {
    ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        max_width: spec.max_width,
        format: OutputFormat::for_source(&source_extension(source), spec.quality),
    }
}

/// Create one width-bounded thumbnail at `output`.
pub fn create_thumbnail(
    backend: &dyn ImageBackend,
    source: &Path,
    output: &Path,
    spec: &ThumbnailSpec,
) -> Result<Dimensions> {
    backend.resize(&plan_thumbnail(source, output, spec))
}

/// Compute the stored placeholder encoding for a source image.
pub fn placeholder_encoding(backend: &dyn ImageBackend, source: &Path) -> Result<String> {
    Ok(backend.sample_grid(source)?.encode())
}

/// Render a placeholder PNG from a stored encoding.
///
/// A missing or malformed encoding renders a flat neutral gray square.
pub fn create_placeholder(
    backend: &dyn ImageBackend,
    encoding: Option<&str>,
    output: &Path,
    size: u32,
) -> Result<()> {
    backend.render_placeholder(&PlaceholderParams {
        output: output.to_path_buf(),
        grid: PlaceholderGrid::decode_or_neutral(encoding),
        size,
    })
}
