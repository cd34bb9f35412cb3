//! Icon variant generation.
//!
//! Resizes each configured icon source into every target size and writes
//! `<output_folder>/<prefix><size>.png` under the build root, then registers
//! the output folder as a public asset with a one-year max-age.
//!
//! ## Failure policy
//!
//! Variants are independent. A variant with no source, an unreadable source,
//! or a file that fails to write is recorded as an [`IconFailure`] and the
//! remaining variants and sizes carry on. Nothing is dropped silently: every
//! failure is sent as a [`PipelineEvent::IconFailed`] and returned in
//! [`IconReport::failures`]. Whether failures fail the build is decided by
//! the caller (`icons.allow_partial`).
//!
//! ## Ordering
//!
//! Every variant and every size runs as a rayon task. All tasks are joined
//! before the folder is registered, so a registered folder never has a file
//! still being written into it.
//!
//! ```text
//! .build/icons/
//! ├── icon-maskable-64.png
//! ├── icon-maskable-192.png
//! ├── icon-apple-192.png       # flattened onto bg_color
//! └── ...
//! ```

use crate::config::{IconVariant, IconsConfig, PipelinePaths};
use crate::imaging::{BackendError, ImageBackend, create_icon, get_dimensions};
use crate::manifest::{ManifestEntry, PublicAssets};
use crate::pipeline::{EventSink, PipelineEvent, emit};
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Why a single variant, or a single size of a variant, was not produced.
#[derive(Error, Debug)]
pub enum IconError {
    #[error("no source file specified")]
    MissingSource,
    #[error("unreadable source image: {0}")]
    ImageDecode(#[source] BackendError),
    #[error("failed to write icon: {0}")]
    ImageWrite(#[source] BackendError),
    #[error("failed to create {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<BackendError> for IconError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Decode { .. } => IconError::ImageDecode(err),
            BackendError::Write { .. } | BackendError::Io(_) => IconError::ImageWrite(err),
        }
    }
}

/// A failure attributed to the variant (and size, when per-file) it hit.
#[derive(Debug)]
pub struct IconFailure {
    pub prefix: String,
    pub src: String,
    /// `None` when the whole variant failed before any size was attempted.
    pub size: Option<u32>,
    pub error: IconError,
}

impl fmt::Display for IconFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let src = if self.src.is_empty() { "<none>" } else { &self.src };
        match self.size {
            Some(size) => write!(f, "{}{}.png (from {}): {}", self.prefix, size, src, self.error),
            None => write!(f, "variant `{}` (from {}): {}", self.prefix, src, self.error),
        }
    }
}

/// Generator-level failure; per-variant problems are [`IconFailure`]s instead.
#[derive(Error, Debug)]
pub enum IconsError {
    #[error("failed to create icon output folder {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What one run of the icon generator produced.
#[derive(Debug)]
pub struct IconReport {
    /// Files written, in variant order then size order.
    pub written: Vec<PathBuf>,
    pub failures: Vec<IconFailure>,
    /// The entry registered for the output folder.
    pub entry: ManifestEntry,
}

impl IconReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Generate every icon variant, then register the output folder.
pub fn generate_icons(
    backend: &impl ImageBackend,
    config: &IconsConfig,
    paths: &PipelinePaths,
    assets: &PublicAssets,
    events: EventSink<'_>,
) -> Result<IconReport, IconsError> {
    let outcomes: Vec<(Vec<PathBuf>, Vec<IconFailure>)> = config
        .variants
        .par_iter()
        .map(|variant| generate_variant(backend, variant, config, paths, events))
        .collect();

    let mut written = Vec::new();
    let mut failures = Vec::new();
    for (files, errs) in outcomes {
        written.extend(files);
        failures.extend(errs);
    }

    // Registered even when every variant failed, so the folder must exist.
    std::fs::create_dir_all(&paths.icons_dir).map_err(|source| IconsError::OutputDir {
        path: paths.icons_dir.clone(),
        source,
    })?;

    let route = format!("/{}", config.folder());
    let entry = ManifestEntry::long_lived(route, paths.icons_dir.clone());
    assets.register(entry.clone());
    emit(events, PipelineEvent::AssetRegistered { entry: entry.clone() });

    Ok(IconReport {
        written,
        failures,
        entry,
    })
}

fn generate_variant(
    backend: &impl ImageBackend,
    variant: &IconVariant,
    config: &IconsConfig,
    paths: &PipelinePaths,
    events: EventSink<'_>,
) -> (Vec<PathBuf>, Vec<IconFailure>) {
    let fail = |size: Option<u32>, error: IconError| {
        let failure = IconFailure {
            prefix: variant.prefix.clone(),
            src: variant.src.clone(),
            size,
            error,
        };
        emit(events, PipelineEvent::IconFailed {
            message: failure.to_string(),
        });
        failure
    };

    if variant.src.is_empty() {
        return (Vec::new(), vec![fail(None, IconError::MissingSource)]);
    }

    if let Err(source) = std::fs::create_dir_all(&paths.icons_dir) {
        let error = IconError::Filesystem {
            path: paths.icons_dir.clone(),
            source,
        };
        return (Vec::new(), vec![fail(None, error)]);
    }

    let sizes = variant.effective_sizes(&config.sizes);
    emit(events, PipelineEvent::IconVariantStarted {
        src: variant.src.clone(),
        sizes: sizes.to_vec(),
        output_folder: config.folder(),
    });

    // Sources are written as site paths (`/public/icon.png`) as often as
    // relative ones; both resolve against the project root.
    let source = paths.root.join(variant.src.trim_start_matches('/'));
    let dims = match get_dimensions(backend, &source) {
        Ok(dims) => dims,
        Err(e) => return (Vec::new(), vec![fail(None, e.into())]),
    };
    debug!("{} is {}x{}", source.display(), dims.0, dims.1);

    let results: Vec<Result<PathBuf, IconFailure>> = sizes
        .par_iter()
        .map(|&size| {
            let output = paths.icons_dir.join(variant.file_name(size));
            match create_icon(backend, &source, output, dims, size, variant.bg_color) {
                Ok(path) => {
                    emit(events, PipelineEvent::IconWritten {
                        file: variant.file_name(size),
                    });
                    Ok(path)
                }
                Err(e) => Err(fail(Some(size), e.into())),
            }
        })
        .collect();

    let mut written = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(path) => written.push(path),
            Err(failure) => failures.push(failure),
        }
    }
    (written, failures)
}
