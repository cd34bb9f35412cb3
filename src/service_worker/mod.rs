//! Service worker generation.
//!
//! One run:
//!
//! 1. **Cleanup**: delete every `sw-runtime-*` file left in the output
//!    folder by earlier builds. Best effort; failures are logged and reported.
//! 2. **Compile**: hand the static output directory, [`PRECACHE_PATTERNS`]
//!    and [`CACHING_RULES`] to a [`WorkerCompiler`].
//! 3. **Write** the script, its chunks and (optionally) the source map.
//! 4. **Register** the output folder at `/` with a one-year max-age.
//!
//! ```text
//! .build/serviceworker/
//! ├── serviceworker.js
//! └── sw-runtime-3fa1c07e.js
//! ```
//!
//! Cleanup runs before compilation, so a chunk written by this run is never
//! deleted by it.

pub mod compiler;
pub mod glob;
pub mod rules;

pub use compiler::{BuiltinCompiler, CompileRequest, CompiledWorker, CompilerError, WorkerCompiler};
pub use rules::{CACHING_RULES, CachingRule, Strategy, UrlMatcher, resolve_rule};

use crate::config::{PipelinePaths, ServiceWorkerConfig};
use crate::manifest::{ManifestEntry, PublicAssets};
use crate::pipeline::{EventSink, PipelineEvent, emit};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Folder under the build root that holds the worker. Served at `/`.
pub const SW_OUTPUT_FOLDER: &str = "serviceworker";

/// File-name prefix of compiler chunks. Anything in the output folder with
/// this prefix is considered stale at the start of a run.
pub const CHUNK_PREFIX: &str = "sw-runtime-";

/// Include patterns, relative to the host's static output directory.
pub const PRECACHE_PATTERNS: [&str; 3] = [
    // General assets outside the bundler folder
    "!(_nuxt)/**/*.{js,json,mjs,css,html,svg,woff2,mp3}",
    // Root documents and media
    "*.{html,svg,png}",
    // Bundled code
    "_nuxt/*.{js,css}",
];

#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    #[error("service worker compilation failed: {0}")]
    CompilerInvocation(#[from] CompilerError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A stale chunk that could not be removed.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not remove {}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

#[derive(Debug)]
pub struct ServiceWorkerReport {
    pub script: PathBuf,
    pub chunks: Vec<PathBuf>,
    pub sourcemap: Option<PathBuf>,
    /// Number of URLs in the precache manifest.
    pub precached: usize,
    pub cleanup: CleanupReport,
    pub warnings: Vec<String>,
    pub entry: ManifestEntry,
}

/// Delete every file in `dir` whose name starts with [`CHUNK_PREFIX`].
///
/// A missing directory is not an error. Nothing here fails the run.
pub fn remove_stale_chunks(dir: &Path, events: EventSink<'_>) -> CleanupReport {
    let mut report = CleanupReport::default();

    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(error) => {
            warn!("cannot list {} for cleanup: {error}", dir.display());
            report.failures.push(CleanupFailure {
                path: dir.to_path_buf(),
                error,
            });
            return report;
        }
    };

    let mut stale: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(CHUNK_PREFIX))
        .map(|entry| entry.path())
        .collect();
    stale.sort();

    for path in stale {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed stale chunk {}", path.display());
                emit(events, PipelineEvent::StaleChunkRemoved { path: path.clone() });
                report.removed.push(path);
            }
            Err(error) => {
                warn!("could not remove stale chunk {}: {error}", path.display());
                emit(events, PipelineEvent::StaleChunkKept {
                    path: path.clone(),
                    reason: error.to_string(),
                });
                report.failures.push(CleanupFailure { path, error });
            }
        }
    }
    report
}

/// Clean, compile, write, register. See the [module docs](self).
pub fn generate_service_worker(
    compiler: &impl WorkerCompiler,
    config: &ServiceWorkerConfig,
    paths: &PipelinePaths,
    assets: &PublicAssets,
    events: EventSink<'_>,
) -> Result<ServiceWorkerReport, ServiceWorkerError> {
    let out_dir = &paths.service_worker_dir;
    let cleanup = remove_stale_chunks(out_dir, events);

    let request = CompileRequest {
        glob_directory: &paths.static_dir,
        glob_patterns: &PRECACHE_PATTERNS,
        rules: &CACHING_RULES,
        sw_file_name: &config.sw_path,
        navigation_preload: config.navigation_preload,
        sourcemap: config.sourcemap,
    };
    let compiled = compiler.compile(&request)?;
    check_chunk_names(&compiled)?;

    for warning in &compiled.warnings {
        warn!("{warning}");
        emit(events, PipelineEvent::ServiceWorkerWarning {
            message: warning.clone(),
        });
    }

    let write = |path: PathBuf, contents: &str| -> Result<PathBuf, ServiceWorkerError> {
        std::fs::write(&path, contents).map_err(|source| ServiceWorkerError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    };

    std::fs::create_dir_all(out_dir).map_err(|source| ServiceWorkerError::Write {
        path: out_dir.clone(),
        source,
    })?;
    let chunks = compiled
        .chunks
        .iter()
        .map(|chunk| write(out_dir.join(&chunk.file_name), &chunk.contents))
        .collect::<Result<Vec<_>, _>>()?;
    let sourcemap = compiled
        .sourcemap
        .as_deref()
        .map(|map| write(out_dir.join(format!("{}.map", config.sw_path)), map))
        .transpose()?;
    // Script last: it references the chunks by name.
    let script = write(out_dir.join(&config.sw_path), &compiled.script)?;

    emit(events, PipelineEvent::ServiceWorkerGenerated {
        script: script.clone(),
        chunks: chunks.len(),
        precached: compiled.precache.len(),
    });

    let entry = ManifestEntry::long_lived("/", out_dir.clone());
    assets.register(entry.clone());
    emit(events, PipelineEvent::AssetRegistered { entry: entry.clone() });

    Ok(ServiceWorkerReport {
        script,
        chunks,
        sourcemap,
        precached: compiled.precache.len(),
        cleanup,
        warnings: compiled.warnings,
        entry,
    })
}

/// Chunks must be plain prefixed file names, or the next run could not
/// clean them up.
fn check_chunk_names(compiled: &CompiledWorker) -> Result<(), CompilerError> {
    for chunk in &compiled.chunks {
        let name = &chunk.file_name;
        let plain = !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..";
        if !plain || !name.starts_with(CHUNK_PREFIX) {
            return Err(CompilerError::InvalidOutput(format!(
                "chunk `{name}` must be a file name starting with `{CHUNK_PREFIX}`"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use compiler::tests::MockCompiler;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ServiceWorkerConfig, PipelinePaths) {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let paths = config.paths(tmp.path()).unwrap();
        (tmp, config.service_worker, paths)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_script_and_chunk_then_registers_root() {
        let (_tmp, config, paths) = setup();
        let assets = PublicAssets::new();

        let report =
            generate_service_worker(&MockCompiler::new(), &config, &paths, &assets, None).unwrap();

        assert_eq!(
            files_in(&paths.service_worker_dir),
            vec!["serviceworker.js", "sw-runtime-mock.js"]
        );
        assert_eq!(report.script, paths.service_worker_dir.join("serviceworker.js"));
        let entries = assets.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].base_url, "/");
        assert_eq!(entries[0].dir, paths.service_worker_dir);
        assert_eq!(entries[0].max_age, 31_536_000);
    }

    #[test]
    fn stale_chunks_removed_and_other_files_kept() {
        let (_tmp, config, paths) = setup();
        let dir = &paths.service_worker_dir;
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("sw-runtime-old1.js"), "old").unwrap();
        fs::write(dir.join("sw-runtime-old2.js"), "old").unwrap();
        fs::write(dir.join("serviceworker.js"), "previous script").unwrap();
        fs::write(dir.join("notes.txt"), "keep").unwrap();

        let report = generate_service_worker(
            &MockCompiler::with_chunks(&["sw-runtime-new.js"]),
            &config,
            &paths,
            &PublicAssets::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.cleanup.removed.len(), 2);
        assert!(report.cleanup.failures.is_empty());
        assert_eq!(
            files_in(dir),
            vec!["notes.txt", "serviceworker.js", "sw-runtime-new.js"]
        );
        assert_eq!(fs::read_to_string(dir.join("serviceworker.js")).unwrap(), "// mock worker\n");
    }

    #[test]
    fn chunk_from_this_run_survives() {
        let (_tmp, config, paths) = setup();
        let compiler = MockCompiler::new();
        generate_service_worker(&compiler, &config, &paths, &PublicAssets::new(), None).unwrap();
        // Second run deletes the first run's chunk, then writes it again
        generate_service_worker(&compiler, &config, &paths, &PublicAssets::new(), None).unwrap();
        assert!(paths.service_worker_dir.join("sw-runtime-mock.js").exists());
    }

    #[test]
    fn missing_output_dir_is_not_a_cleanup_failure() {
        let tmp = TempDir::new().unwrap();
        let report = remove_stale_chunks(&tmp.path().join("absent"), None);
        assert!(report.removed.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn cleanup_leaves_prefixed_directories_alone() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sw-runtime-dir")).unwrap();
        let report = remove_stale_chunks(tmp.path(), None);
        assert!(report.removed.is_empty());
        assert!(tmp.path().join("sw-runtime-dir").is_dir());
    }

    #[test]
    fn compiler_receives_patterns_rules_and_flags() {
        let (_tmp, mut config, paths) = setup();
        config.navigation_preload = false;
        config.sourcemap = true;
        let compiler = MockCompiler::new();

        let assets = PublicAssets::new();
        let report = generate_service_worker(&compiler, &config, &paths, &assets, None).unwrap();

        let requests = compiler.get_requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.glob_directory, paths.static_dir);
        assert_eq!(req.glob_patterns, PRECACHE_PATTERNS.to_vec());
        assert_eq!(req.rule_count, 4);
        assert_eq!(req.sw_file_name, "serviceworker.js");
        assert!(!req.navigation_preload);
        assert!(req.sourcemap);
        assert_eq!(
            report.sourcemap,
            Some(paths.service_worker_dir.join("serviceworker.js.map"))
        );
    }

    #[test]
    fn compiler_failure_is_fatal_and_registers_nothing() {
        let (_tmp, config, paths) = setup();
        let assets = PublicAssets::new();

        let result =
            generate_service_worker(&MockCompiler::failing(), &config, &paths, &assets, None);

        assert!(matches!(result, Err(ServiceWorkerError::CompilerInvocation(_))));
        assert!(assets.entries().is_empty());
        assert!(!paths.service_worker_dir.join("serviceworker.js").exists());
    }

    #[test]
    fn unprefixed_chunk_is_rejected() {
        let (_tmp, config, paths) = setup();
        let result = generate_service_worker(
            &MockCompiler::with_chunks(&["workbox-abc.js"]),
            &config,
            &paths,
            &PublicAssets::new(),
            None,
        );
        assert!(matches!(
            result,
            Err(ServiceWorkerError::CompilerInvocation(CompilerError::InvalidOutput(_)))
        ));
    }

    #[test]
    fn nested_chunk_path_is_rejected() {
        let (_tmp, config, paths) = setup();
        let result = generate_service_worker(
            &MockCompiler::with_chunks(&["sw-runtime-x/../../escape.js"]),
            &config,
            &paths,
            &PublicAssets::new(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn builtin_compiler_end_to_end() {
        let (_tmp, config, paths) = setup();
        fs::create_dir_all(&paths.static_dir).unwrap();
        fs::write(paths.static_dir.join("index.html"), "<html></html>").unwrap();

        let report = generate_service_worker(
            &BuiltinCompiler::new(),
            &config,
            &paths,
            &PublicAssets::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.precached, 1);
        let script = fs::read_to_string(&report.script).unwrap();
        let chunk_name = report.chunks[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(script.contains(&chunk_name));
        assert!(chunk_name.starts_with(CHUNK_PREFIX));
    }

    #[test]
    fn events_cover_cleanup_generation_and_registration() {
        let (_tmp, config, paths) = setup();
        fs::create_dir_all(&paths.service_worker_dir).unwrap();
        fs::write(paths.service_worker_dir.join("sw-runtime-old.js"), "").unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        let assets = PublicAssets::new();
        generate_service_worker(&MockCompiler::new(), &config, &paths, &assets, Some(&tx)).unwrap();
        drop(tx);

        let events: Vec<PipelineEvent> = rx.iter().collect();
        assert!(matches!(events[0], PipelineEvent::StaleChunkRemoved { .. }));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ServiceWorkerGenerated { chunks: 1, .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::AssetRegistered { .. })));
    }

    #[test]
    fn cleanup_failure_display() {
        let failure = CleanupFailure {
            path: PathBuf::from("/b/serviceworker/sw-runtime-1.js"),
            error: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            failure.to_string(),
            "could not remove /b/serviceworker/sw-runtime-1.js: denied"
        );
    }
}
