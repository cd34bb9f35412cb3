//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `assets.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! build_dir = ".build"            # Generated output root (relative to the project root)
//! static_dir = ".output/public"   # Host's built static files, scanned for precaching
//!
//! [icons]
//! sizes = [64, 120, 144, 152, 192, 384, 512]
//! output_folder = "icons"         # Served at /icons
//! allow_partial = false           # Succeed even when some variants fail
//!
//! [[icons.variants]]
//! src = "public/icon.png"
//! prefix = "icon-maskable-"       # Files: icon-maskable-64.png, ...
//! purpose = "maskable"            # Descriptive only
//! bg_color = "#fee2e2"            # Optional: flatten onto an opaque background
//! sizes = [192]                   # Optional: override [icons].sizes
//!
//! [service_worker]
//! sw_path = "serviceworker.js"    # File name inside <build_dir>/serviceworker/
//! navigation_preload = true
//! sourcemap = false
//!
//! [processing]
//! max_processes = 4               # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Color;
use crate::service_worker::{CHUNK_PREFIX, SW_OUTPUT_FOLDER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "assets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level pipeline configuration loaded from `assets.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of all generated output, relative to the project root.
    pub build_dir: String,
    /// The host's already-built static output, used as the precache glob root.
    pub static_dir: String,
    /// Icon variant generation.
    pub icons: IconsConfig,
    /// Service worker generation.
    pub service_worker: ServiceWorkerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            build_dir: ".build".to_string(),
            static_dir: ".output/public".to_string(),
            icons: IconsConfig::default(),
            service_worker: ServiceWorkerConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_dir.trim().is_empty() {
            return Err(ConfigError::Validation("build_dir must not be empty".into()));
        }
        self.icons.validate()?;
        self.service_worker.validate()?;
        Ok(())
    }

    /// Resolve every directory the pipeline touches against the project root.
    pub fn paths(&self, root: &Path) -> std::io::Result<PipelinePaths> {
        let root = std::path::absolute(root)?;
        let build_root = root.join(&self.build_dir);
        Ok(PipelinePaths {
            icons_dir: build_root.join(self.icons.folder()),
            service_worker_dir: build_root.join(SW_OUTPUT_FOLDER),
            static_dir: root.join(&self.static_dir),
            build_root,
            root,
        })
    }
}

/// Absolute locations derived from [`PipelineConfig`] and a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    /// Project root; icon sources are resolved against it.
    pub root: PathBuf,
    /// `<root>/<build_dir>`.
    pub build_root: PathBuf,
    /// `<build_root>/<icons.output_folder>`.
    pub icons_dir: PathBuf,
    /// `<build_root>/serviceworker`.
    pub service_worker_dir: PathBuf,
    /// `<root>/<static_dir>`.
    pub static_dir: PathBuf,
}

/// Icon variant generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconsConfig {
    /// Pixel widths generated for every variant without its own `sizes`.
    pub sizes: Vec<u32>,
    /// Folder under the build root; also the served route prefix.
    pub output_folder: String,
    /// When false, any failed variant makes the build fail after all
    /// variants have been attempted.
    pub allow_partial: bool,
    /// Icon families to generate.
    pub variants: Vec<IconVariant>,
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            sizes: vec![64, 120, 144, 152, 192, 384, 512],
            output_folder: "icons".to_string(),
            allow_partial: false,
            variants: Vec::new(),
        }
    }
}

impl IconsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation("icons.sizes must not be empty".into()));
        }
        if self.sizes.contains(&0) {
            return Err(ConfigError::Validation(
                "icons.sizes values must be positive".into(),
            ));
        }
        self.validate_folder()?;

        // (prefix, size) → file name must be unique across variants, or two
        // variants would silently overwrite each other's files.
        let mut owners: HashMap<String, &str> = HashMap::new();
        for variant in self.variants.iter().filter(|v| !v.src.is_empty()) {
            let sizes = variant.effective_sizes(&self.sizes);
            if sizes.is_empty() || sizes.contains(&0) {
                return Err(ConfigError::Validation(format!(
                    "icons.variants `{}`: sizes must be non-empty and positive",
                    variant.prefix
                )));
            }
            for &size in sizes {
                let name = variant.file_name(size);
                if let Some(other) = owners.insert(name.clone(), &variant.src) {
                    return Err(ConfigError::Validation(format!(
                        "icons.variants: {name} would be written by both {other} and {}",
                        variant.src
                    )));
                }
            }
        }
        Ok(())
    }

    /// `output_folder` as slash-joined path segments, e.g. `img/icons`.
    ///
    /// Surrounding slashes are ignored. This is both the folder under the
    /// build root and the served route prefix.
    pub fn folder(&self) -> String {
        Path::new(self.output_folder.trim_matches('/'))
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The icon folder must be a plain subdirectory of the build root that
    /// does not overlap the service worker folder.
    fn validate_folder(&self) -> Result<(), ConfigError> {
        let invalid = || {
            ConfigError::Validation(format!(
                "icons.output_folder {:?} must be a plain relative folder under build_dir",
                self.output_folder
            ))
        };
        let mut first = None;
        for component in Path::new(self.output_folder.trim_matches('/')).components() {
            match component {
                Component::Normal(name) => {
                    first.get_or_insert(name);
                }
                _ => return Err(invalid()),
            }
        }
        match first {
            None => Err(invalid()),
            Some(name) if name == SW_OUTPUT_FOLDER => Err(ConfigError::Validation(format!(
                "icons.output_folder must not be inside the \"{SW_OUTPUT_FOLDER}\" folder"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Every output file name the configured variants will produce.
    pub fn planned_files(&self) -> Vec<String> {
        self.variants
            .iter()
            .filter(|v| !v.src.is_empty())
            .flat_map(|v| {
                v.effective_sizes(&self.sizes)
                    .iter()
                    .map(move |&size| v.file_name(size))
            })
            .collect()
    }
}

/// One icon family, e.g. the maskable icon generated at every size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconVariant {
    /// Source image, relative to the project root. Empty is reported as a
    /// missing source at generation time.
    #[serde(default)]
    pub src: String,
    /// File name prefix: `<prefix><size>.png`.
    pub prefix: String,
    /// Descriptive purpose tag (`any`, `maskable`, `monochrome`).
    #[serde(default)]
    pub purpose: String,
    /// Opaque background the resized icon is flattened onto.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Color>,
    /// Per-variant override of `icons.sizes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<u32>>,
}

impl IconVariant {
    /// Sizes this variant is generated at.
    pub fn effective_sizes<'a>(&'a self, global: &'a [u32]) -> &'a [u32] {
        self.sizes.as_deref().unwrap_or(global)
    }

    pub fn file_name(&self, size: u32) -> String {
        format!("{}{}.png", self.prefix, size)
    }
}

/// Service worker generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceWorkerConfig {
    /// Script file name inside `<build_dir>/serviceworker/`.
    pub sw_path: String,
    /// Enable navigation preload when the worker activates.
    pub navigation_preload: bool,
    /// Append a `sourceMappingURL` comment and write a minimal source map.
    pub sourcemap: bool,
}

impl Default for ServiceWorkerConfig {
    fn default() -> Self {
        Self {
            sw_path: "serviceworker.js".to_string(),
            navigation_preload: true,
            sourcemap: false,
        }
    }
}

impl ServiceWorkerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.sw_path.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(ConfigError::Validation(
                "service_worker.sw_path must be a plain file name".into(),
            ));
        }
        if name.starts_with(CHUNK_PREFIX) {
            return Err(ConfigError::Validation(format!(
                "service_worker.sw_path must not start with \"{CHUNK_PREFIX}\" (stale chunk prefix)"
            )));
        }
        Ok(())
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Load config from a file that must exist.
pub fn load_required_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    match load_raw_config(path)? {
        Some(value) => resolve_config(Some(value)),
        None => Err(ConfigError::NotFound(path.to_path_buf())),
    }
}

/// Returns a fully-commented stock `assets.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pwa-assets configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Root of all generated output, relative to the project root.
build_dir = ".build"

# The host's already-built static files. The service worker precaches
# matching files found here.
static_dir = ".output/public"

# ---------------------------------------------------------------------------
# Icon variants
# ---------------------------------------------------------------------------
[icons]
# Pixel widths generated for every variant (unless the variant overrides).
sizes = [64, 120, 144, 152, 192, 384, 512]

# Folder under build_dir. Served at /<output_folder> with a one-year max-age.
output_folder = "icons"

# When false, a variant that fails (missing source, unreadable image) fails
# the build after every other variant has been generated.
allow_partial = false

# One [[icons.variants]] block per icon family. Output file names are
# <prefix><size>.png and must not collide across variants.
#
# [[icons.variants]]
# src = "public/icon.png"
# prefix = "icon-maskable-"
# purpose = "maskable"
#
# [[icons.variants]]
# src = "public/icon.png"
# prefix = "icon-apple-"
# purpose = "any"
# bg_color = "#fee2e2"     # flatten transparency onto this colour
# sizes = [192]            # override [icons].sizes

# ---------------------------------------------------------------------------
# Service worker
# ---------------------------------------------------------------------------
[service_worker]
# Script file name, written to <build_dir>/serviceworker/ and served from /.
sw_path = "serviceworker.js"

# Enable navigation preload when the worker activates.
navigation_preload = true

# Emit a source map next to the script.
sourcemap = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
