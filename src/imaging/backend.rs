//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: identify, resize, sample_grid and render_placeholder.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure Rust codecs.

use super::calculations::PlaceholderGrid;
use super::params::{PlaceholderParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Send + Sync` because one backend is shared by the scanner, the
/// derivative cache and the rayon pool.
pub trait ImageBackend: Send + Sync {
    /// Get stored pixel dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode, orient, resize and encode. Returns the written dimensions.
    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError>;

    /// Decode the source and box-average it into a placeholder grid.
    fn sample_grid(&self, path: &Path) -> Result<PlaceholderGrid, BackendError>;

    /// Upscale a placeholder grid with a linear filter and write it as PNG.
    fn render_placeholder(&self, params: &PlaceholderParams) -> Result<(), BackendError>;
}
