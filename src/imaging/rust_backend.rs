//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate decoders, EXIF orientation applied |
//! | Identify | `image::image_dimensions` (header only) |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode PNG | `image::codecs::png::PngEncoder` |
//! | Placeholder upscale | `image::imageops::resize` with `Triangle` (linear) filter |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{GRID_SIZE, PlaceholderGrid, average_grid, bounded_dimensions};
use super::params::{OutputFormat, PlaceholderParams, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load, decode and orient an image from disk.
///
/// The EXIF orientation tag is honoured so derivatives display upright.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let decode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };
    let mut decoder = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn save_image(img: &DynamicImage, path: &Path, format: OutputFormat) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    match format {
        OutputFormat::Jpeg(quality) => {
            let encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
        }
        OutputFormat::Png => img
            .write_with_encoder(PngEncoder::new(writer))
            .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e))),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let (width, height) = bounded_dimensions((img.width(), img.height()), params.max_width);
        let resized = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };
        save_image(&resized, &params.output, params.format)?;
        Ok(Dimensions { width, height })
    }

    fn sample_grid(&self, path: &Path) -> Result<PlaceholderGrid, BackendError> {
        let rgb = load_image(path)?.to_rgb8();
        Ok(average_grid(rgb.as_raw(), rgb.width(), rgb.height()))
    }

    fn render_placeholder(&self, params: &PlaceholderParams) -> Result<(), BackendError> {
        let grid = params.grid;
        let small = RgbImage::from_fn(GRID_SIZE, GRID_SIZE, |x, y| image::Rgb(grid.cell(x, y)));
        let size = params.size.max(1);
        let upscaled = image::imageops::resize(&small, size, size, FilterType::Triangle);
        save_image(
            &DynamicImage::ImageRgb8(upscaled),
            &params.output,
            OutputFormat::Png,
        )
    }
}
