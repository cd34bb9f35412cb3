//! Public-asset registration.
//!
//! The host server serves static directories from a list of public-asset
//! entries: a route prefix, an absolute directory, and a cache lifetime.
//! Each generator appends exactly one entry once its output is on disk.
//!
//! [`PublicAssets`] is the in-memory list. Generators run concurrently, so
//! appends go through a mutex; entries are never mutated after registration.
//!
//! ## Handing entries to the host
//!
//! Entries serialize with the host's field names:
//!
//! ```json
//! [
//!   { "baseURL": "/icons", "dir": "/srv/app/.build/icons", "maxAge": 31536000 },
//!   { "baseURL": "/", "dir": "/srv/app/.build/serviceworker", "maxAge": 31536000 }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Cache lifetime applied to every generated directory: one year.
pub const ONE_YEAR_SECS: u64 = 60 * 60 * 24 * 365;

/// File name the CLI writes the registered entries to, inside the build root.
pub const PUBLIC_ASSETS_FILENAME: &str = "public-assets.json";

/// One public-asset directory the host should serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Route prefix, e.g. `/icons` or `/`.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Absolute path of the directory on disk.
    pub dir: PathBuf,
    /// Client cache lifetime in seconds.
    #[serde(rename = "maxAge")]
    pub max_age: u64,
}

impl ManifestEntry {
    /// Entry with the standard one-year lifetime.
    pub fn long_lived(base_url: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            dir: dir.into(),
            max_age: ONE_YEAR_SECS,
        }
    }
}

/// Append-only list of public assets shared by all generators.
#[derive(Debug, Default)]
pub struct PublicAssets {
    entries: Mutex<Vec<ManifestEntry>>,
}

impl PublicAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from entries the host already has.
    pub fn with_entries(entries: Vec<ManifestEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Append an entry. Safe to call from several generators at once.
    pub fn register(&self, entry: ManifestEntry) {
        debug!(
            "Registering public asset {} -> {}",
            entry.base_url,
            entry.dir.display()
        );
        // A poisoned lock only means another generator panicked mid-push;
        // the Vec itself is still consistent.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
    }

    /// Copy of the current entries, in registration order.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Write entries as pretty JSON to `<build_root>/public-assets.json`.
pub fn write_public_assets(
    build_root: &Path,
    entries: &[ManifestEntry],
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(build_root)?;
    let path = build_root.join(PUBLIC_ASSETS_FILENAME);
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
