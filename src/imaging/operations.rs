//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::scaled_dimensions;
use super::color::Color;
use super::params::IconParams;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Plan an icon resize without executing it.
pub fn plan_icon(
    source: &Path,
    output: PathBuf,
    original_dims: (u32, u32),
    size: u32,
    background: Option<Color>,
) -> IconParams {
    let (width, height) = scaled_dimensions(original_dims, size);
    IconParams {
        source: source.to_path_buf(),
        output,
        width,
        height,
        background,
    }
}

/// Create one icon file and return its path.
pub fn create_icon(
    backend: &impl ImageBackend,
    source: &Path,
    output: PathBuf,
    original_dims: (u32, u32),
    size: u32,
    background: Option<Color>,
) -> Result<PathBuf> {
    let params = plan_icon(source, output, original_dims, size, background);
    backend.resize_icon(&params)?;
    Ok(params.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::square(1024);
        assert_eq!(get_dimensions(&backend, Path::new("/icon.png")).unwrap(), (1024, 1024));
    }

    #[test]
    fn plan_icon_scales_to_width() {
        let params = plan_icon(
            Path::new("/icon.png"),
            PathBuf::from("/out/icon-64.png"),
            (512, 256),
            64,
            None,
        );
        assert_eq!((params.width, params.height), (64, 32));
        assert_eq!(params.output, PathBuf::from("/out/icon-64.png"));
    }

    #[test]
    fn create_icon_passes_background_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let bg = Color::rgb(0xfe, 0xe2, 0xe2);

        let written = create_icon(
            &backend,
            Path::new("/icon.png"),
            tmp.path().join("icon-apple-192.png"),
            (512, 512),
            192,
            Some(bg),
        )
        .unwrap();

        assert!(written.ends_with("icon-apple-192.png"));
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::ResizeIcon { width: 192, height: 192, background: Some(c), .. } if *c == bg
        ));
    }
}
