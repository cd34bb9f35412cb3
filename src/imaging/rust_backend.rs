//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Flatten | alpha composite onto an opaque colour (below) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (default compression) |
//!
//! PNG encoding carries no timestamps, so the same source and parameters
//! always produce the same bytes.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::color::Color;
use super::params::IconParams;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use std::fs::File;
use std::io::BufReader;
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

fn decode_err(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Open an image, sniffing the format from content rather than the extension.
fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .map_err(|e| decode_err(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_err(path, e))
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    open_reader(path)?.decode().map_err(|e| decode_err(path, e))
}

/// Composite an image over an opaque background colour.
///
/// Per channel: `out = src * α + bg * (1 - α)`, in integer arithmetic so the
/// result is exact and repeatable.
pub(crate) fn flatten(img: &DynamicImage, background: Color) -> RgbImage {
    let [br, bg, bb] = background.opaque();
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend =
            |src: u8, dst: u8| ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r, br), blend(g, bg), blend(b, bb)])
    })
}

/// Encode and save as PNG.
fn save_png(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(|e| BackendError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let writer = std::io::BufWriter::new(file);
    img.write_with_encoder(PngEncoder::new(writer))
        .map_err(|e| BackendError::Write {
            path: path.to_path_buf(),
            reason: format!("PNG encode failed: {e}"),
        })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?
            .into_dimensions()
            .map_err(|e| decode_err(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn resize_icon(&self, params: &IconParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);

        let final_img = match params.background {
            Some(color) => DynamicImage::ImageRgb8(flatten(&resized, color)),
            None => resized,
        };

        save_png(&final_img, &params.output)
    }
}
