//! Image processing on the `image` crate's pure Rust codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize → JPEG/PNG** | Lanczos3, orientation-corrected |
//! | **Placeholder grid** | 4x4 box average, base64 encoded |
//! | **Placeholder render** | linear upscale to a small PNG |
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math and grid encoding (unit testable)
//! - **Parameters**: data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: high-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{GRID_BYTES, PlaceholderGrid, average_grid, bounded_dimensions};
pub use operations::ThumbnailSpec;
pub use params::{OutputFormat, Quality};
pub use rust_backend::RustBackend;
