//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the pipeline's only view of pixel work:
//! identify a source image and produce one resized icon file. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).

use super::params::IconParams;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` because icon sizes are produced from rayon worker threads that
/// share one backend.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize the source, flatten if requested, and write a PNG.
    fn resize_icon(&self, params: &IconParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Color;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    ///
    /// `resize_icon` writes a small placeholder file so callers can check
    /// what landed on disk. Uses Mutex (not RefCell) so it is Sync and works
    /// with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Option<Dimensions>,
        /// Source paths whose identify/resize should fail with a decode error.
        pub corrupt: HashSet<PathBuf>,
        /// Output file names whose write should fail.
        pub unwritable: HashSet<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        ResizeIcon {
            source: String,
            output: String,
            width: u32,
            height: u32,
            background: Option<Color>,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::square(512)
        }

        pub fn square(side: u32) -> Self {
            Self {
                dimensions: Some(Dimensions {
                    width: side,
                    height: side,
                }),
                ..Default::default()
            }
        }

        pub fn with_corrupt(mut self, path: impl Into<PathBuf>) -> Self {
            self.corrupt.insert(path.into());
            self
        }

        pub fn with_unwritable(mut self, file_name: &str) -> Self {
            self.unwritable.insert(file_name.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_outputs(&self) -> Vec<String> {
            let mut outputs: Vec<String> = self
                .get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::ResizeIcon { output, .. } => Some(output),
                    RecordedOp::Identify(_) => None,
                })
                .collect();
            outputs.sort();
            outputs
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            if self.corrupt.contains(path) {
                return Err(BackendError::Decode {
                    path: path.to_path_buf(),
                    reason: "mock corrupt image".into(),
                });
            }
            self.dimensions.ok_or_else(|| BackendError::Decode {
                path: path.to_path_buf(),
                reason: "no mock dimensions".into(),
            })
        }

        fn resize_icon(&self, params: &IconParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::ResizeIcon {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                background: params.background,
            });

            let file_name = params
                .output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.unwritable.contains(&file_name) {
                return Err(BackendError::Write {
                    path: params.output.clone(),
                    reason: "mock write failure".into(),
                });
            }
            std::fs::write(&params.output, format!("{}x{}", params.width, params.height))?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::square(800);
        let dims = backend.identify(Path::new("/test/icon.png")).unwrap();
        assert_eq!(dims, Dimensions { width: 800, height: 800 });

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/icon.png"));
    }

    #[test]
    fn mock_corrupt_source_fails_identify() {
        let backend = MockBackend::new().with_corrupt("/bad.png");
        let result = backend.identify(Path::new("/bad.png"));
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn mock_records_resize_and_writes_placeholder() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("icon-64.png");
        let backend = MockBackend::new();

        backend
            .resize_icon(&IconParams {
                source: "/icon.png".into(),
                output: output.clone(),
                width: 64,
                height: 64,
                background: None,
            })
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "64x64");
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::ResizeIcon { width: 64, height: 64, background: None, .. }
        ));
    }

    #[test]
    fn decode_error_names_the_file() {
        let err = BackendError::Decode {
            path: "/public/icon.png".into(),
            reason: "bad header".into(),
        };
        assert_eq!(err.to_string(), "Failed to decode /public/icon.png: bad header");
    }
}
