//! Service worker compilation.
//!
//! [`WorkerCompiler`] is the generator's view of the compile step: given the
//! static output directory, the include patterns and the rule table, return
//! the worker script and any chunks it loads. Nothing here touches the
//! output directory; the generator writes what the compiler returns.
//!
//! [`BuiltinCompiler`] produces:
//!
//! ```text
//! serviceworker.js          importScripts + setup({ precache, runtimeCaching, ... })
//! sw-runtime-<hash8>.js     strategies, precache install, old-cache cleanup
//! serviceworker.js.map      only with `sourcemap = true`
//! ```
//!
//! Precache revisions are the first 32 hex characters of the SHA-256 of each
//! file, and the precache cache name is derived from all of them, so a
//! changed file yields a new cache and the runtime drops the old one on
//! activate.

use super::CHUNK_PREFIX;
use super::glob::{Glob, GlobError};
use super::rules::CachingRule;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// The runtime loaded by every generated worker.
pub const RUNTIME_JS: &str = include_str!("../../static/sw-runtime.js");

/// Files above this size are left out of the precache with a warning.
pub const MAX_PRECACHE_FILE_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize worker config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid compiler output: {0}")]
    InvalidOutput(String),
}

/// Everything the compiler needs for one worker.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// Root the include patterns are matched against.
    pub glob_directory: &'a Path,
    pub glob_patterns: &'a [&'a str],
    pub rules: &'a [CachingRule],
    /// File name the script will be written under.
    pub sw_file_name: &'a str,
    pub navigation_preload: bool,
    pub sourcemap: bool,
}

/// One precached URL and the content revision it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: String,
}

/// An auxiliary file the script loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledWorker {
    pub script: String,
    pub chunks: Vec<Chunk>,
    pub sourcemap: Option<String>,
    pub precache: Vec<PrecacheEntry>,
    /// Non-fatal notes, e.g. files skipped for size.
    pub warnings: Vec<String>,
}

/// Turns a [`CompileRequest`] into worker files.
///
/// `Sync` so it can be shared with the icon generator running in parallel.
pub trait WorkerCompiler: Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledWorker, CompilerError>;
}

/// The production compiler. See the [module docs](self).
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCompiler;

impl BuiltinCompiler {
    pub fn new() -> Self {
        Self
    }
}

/// Config object handed to `swRuntime.setup()`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeSetup<'a> {
    precache_id: String,
    navigation_preload: bool,
    precache: &'a [PrecacheEntry],
    runtime_caching: &'a [CachingRule],
}

impl WorkerCompiler for BuiltinCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledWorker, CompilerError> {
        let (precache, warnings) = scan_precache(request.glob_directory, request.glob_patterns)?;
        debug!(
            "precache: {} files from {}",
            precache.len(),
            request.glob_directory.display()
        );

        let runtime_name = runtime_chunk_name();
        let setup = RuntimeSetup {
            precache_id: precache_id(&precache),
            navigation_preload: request.navigation_preload,
            precache: &precache,
            runtime_caching: request.rules,
        };
        let setup_json = serde_json::to_string_pretty(&setup)?;

        let mut script = format!(
            "// Generated by pwa-assets. Do not edit.\n\
             importScripts('./{runtime_name}');\n\
             \n\
             self.swRuntime.setup({setup_json});\n"
        );

        let sourcemap = if request.sourcemap {
            let map_name = format!("{}.map", request.sw_file_name);
            script.push_str(&format!("//# sourceMappingURL={map_name}\n"));
            let map = serde_json::json!({
                "version": 3,
                "file": request.sw_file_name,
                "sources": [],
                "names": [],
                "mappings": "",
            });
            Some(serde_json::to_string(&map)?)
        } else {
            None
        };

        Ok(CompiledWorker {
            script,
            chunks: vec![Chunk {
                file_name: runtime_name,
                contents: RUNTIME_JS.to_string(),
            }],
            sourcemap,
            precache,
            warnings,
        })
    }
}

/// `sw-runtime-<first 8 hex of the runtime's SHA-256>.js`
pub fn runtime_chunk_name() -> String {
    let digest = format!("{:x}", Sha256::digest(RUNTIME_JS.as_bytes()));
    format!("{CHUNK_PREFIX}{}.js", &digest[..8])
}

/// Content revision: first 32 hex characters of the SHA-256.
pub fn revision(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..32].to_string()
}

fn precache_id(entries: &[PrecacheEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.url.as_bytes());
        hasher.update(b"\0");
        hasher.update(entry.revision.as_bytes());
        hasher.update(b"\n");
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Walk `root` and collect every file matching at least one pattern.
///
/// A missing root gives an empty precache plus a warning: on a first build
/// the host has not produced its static output yet.
pub fn scan_precache(
    root: &Path,
    patterns: &[&str],
) -> Result<(Vec<PrecacheEntry>, Vec<String>), CompilerError> {
    let globs = patterns
        .iter()
        .map(|p| Glob::new(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    if !root.is_dir() {
        warnings.push(format!(
            "{} does not exist; nothing to precache",
            root.display()
        ));
        return Ok((entries, warnings));
    }

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| CompilerError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let url: String = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !globs.iter().any(|g| g.is_match(&url)) {
            continue;
        }

        let len = entry
            .metadata()
            .map_err(|source| CompilerError::Scan {
                path: entry.path().to_path_buf(),
                source,
            })?
            .len();
        if len > MAX_PRECACHE_FILE_SIZE {
            warnings.push(format!(
                "{url} is {len} bytes, over the {MAX_PRECACHE_FILE_SIZE} byte limit; not precached"
            ));
            continue;
        }
        let bytes = std::fs::read(entry.path()).map_err(|source| CompilerError::Read {
            path: entry.path().to_path_buf(),
            source,
        })?;
        entries.push(PrecacheEntry {
            url,
            revision: revision(&bytes),
        });
    }

    entries.sort_by(|a, b| a.url.cmp(&b.url));
    Ok((entries, warnings))
}
