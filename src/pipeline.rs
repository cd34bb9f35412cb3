//! Build hook: run both generators and wait for them.
//!
//! The host build driver calls [`run_asset_pipeline`] once, before it
//! finalizes its serving configuration. Icons and the service worker are
//! independent, so they run as the two halves of a `rayon::join`; the call
//! returns only after both have settled, and every entry either of them
//! registered is in [`PipelineOutput::entries`].
//!
//! ## Failure policy
//!
//! | Failure | Result |
//! |---|---|
//! | Invalid config | `Err(Config)`, nothing runs |
//! | Service worker compile/write | `Err(ServiceWorker)` |
//! | Icon output folder cannot be created | `Err(Icons)` |
//! | One icon variant or size | recorded in `icons.failures`, `Ok` |
//! | Stale chunk cleanup | recorded in `service_worker.cleanup`, `Ok` |
//!
//! Per-variant icon failures become fatal through
//! [`PipelineOutput::enforce_icon_policy`] unless `icons.allow_partial` is set.
//!
//! ## Progress
//!
//! Generators report through an optional `Sender<PipelineEvent>`. The CLI
//! renders them with [`output::format_event`](crate::output::format_event)
//! on a printer thread; library callers may pass `None`.

use crate::config::{ConfigError, PipelineConfig};
use crate::icons::{IconReport, IconsError, generate_icons};
use crate::imaging::{ImageBackend, RustBackend};
use crate::manifest::{ManifestEntry, PublicAssets};
use crate::service_worker::{
    BuiltinCompiler, ServiceWorkerError, ServiceWorkerReport, WorkerCompiler,
    generate_service_worker,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::debug;

/// Progress reported while the pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A variant passed its source check and is about to be resized.
    IconVariantStarted {
        src: String,
        sizes: Vec<u32>,
        output_folder: String,
    },
    IconWritten {
        file: String,
    },
    /// One variant or one size failed; the message names both.
    IconFailed {
        message: String,
    },
    StaleChunkRemoved {
        path: PathBuf,
    },
    StaleChunkKept {
        path: PathBuf,
        reason: String,
    },
    ServiceWorkerWarning {
        message: String,
    },
    ServiceWorkerGenerated {
        script: PathBuf,
        chunks: usize,
        precached: usize,
    },
    AssetRegistered {
        entry: ManifestEntry,
    },
}

/// Where generators send [`PipelineEvent`]s, if anywhere.
pub type EventSink<'a> = Option<&'a Sender<PipelineEvent>>;

/// Send an event. A dropped receiver is not an error.
pub fn emit(events: EventSink<'_>, event: PipelineEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot resolve project root {}: {source}", root.display())]
    Root {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Icons(#[from] IconsError),
    #[error(transparent)]
    ServiceWorker(#[from] ServiceWorkerError),
    #[error("{failed} icon(s) failed (set icons.allow_partial = true to accept)")]
    IncompleteIcons { failed: usize },
}

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The registrar's full list after both generators registered.
    pub entries: Vec<ManifestEntry>,
    pub icons: IconReport,
    pub service_worker: ServiceWorkerReport,
}

impl PipelineOutput {
    /// Turn per-variant icon failures into an error unless partial output
    /// is allowed.
    pub fn enforce_icon_policy(&self, allow_partial: bool) -> Result<(), PipelineError> {
        if allow_partial || self.icons.is_complete() {
            Ok(())
        } else {
            Err(PipelineError::IncompleteIcons {
                failed: self.icons.failures.len(),
            })
        }
    }
}

/// Run the pipeline with the production backend and compiler.
///
/// `root` is the project root; relative paths in `config` resolve against it.
pub fn run_asset_pipeline(
    config: &PipelineConfig,
    root: &Path,
    events: EventSink<'_>,
) -> Result<PipelineOutput, PipelineError> {
    let assets = PublicAssets::new();
    run_with(
        &RustBackend::new(),
        &BuiltinCompiler::new(),
        config,
        root,
        &assets,
        events,
    )
}

/// Run the pipeline against an injected backend, compiler and registrar.
pub fn run_with(
    backend: &impl ImageBackend,
    compiler: &impl WorkerCompiler,
    config: &PipelineConfig,
    root: &Path,
    assets: &PublicAssets,
    events: EventSink<'_>,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let paths = config.paths(root).map_err(|source| PipelineError::Root {
        root: root.to_path_buf(),
        source,
    })?;
    debug!(
        "build root {}, static output {}",
        paths.build_root.display(),
        paths.static_dir.display()
    );

    let (icons, service_worker) = rayon::join(
        || generate_icons(backend, &config.icons, &paths, assets, events),
        || generate_service_worker(compiler, &config.service_worker, &paths, assets, events),
    );
    // Both halves have settled here, whichever of them failed.
    let service_worker = service_worker?;
    let icons = icons?;

    Ok(PipelineOutput {
        entries: assets.entries(),
        icons,
        service_worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IconVariant;
    use crate::imaging::backend::tests::MockBackend;
    use crate::service_worker::compiler::tests::MockCompiler;
    use tempfile::TempDir;

    fn config_with_variants(variants: Vec<IconVariant>) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.icons.sizes = vec![64, 192];
        config.icons.variants = variants;
        config
    }

    fn maskable() -> IconVariant {
        IconVariant {
            src: "public/icon.png".into(),
            prefix: "icon-maskable-".into(),
            purpose: "maskable".into(),
            bg_color: None,
            sizes: None,
        }
    }

    fn sorted_base_urls(entries: &[ManifestEntry]) -> Vec<String> {
        let mut urls: Vec<String> = entries.iter().map(|e| e.base_url.clone()).collect();
        urls.sort();
        urls
    }

    #[test]
    fn registers_icons_and_service_worker() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_variants(vec![maskable()]);
        let assets = PublicAssets::new();

        let output = run_with(
            &MockBackend::new(),
            &MockCompiler::new(),
            &config,
            tmp.path(),
            &assets,
            None,
        )
        .unwrap();

        assert_eq!(output.entries.len(), 2);
        assert_eq!(sorted_base_urls(&output.entries), vec!["/", "/icons"]);
        assert_ne!(output.icons.entry.dir, output.service_worker.entry.dir);
        assert!(output.entries.iter().all(|e| e.max_age == 31_536_000));
        assert!(output.entries.iter().all(|e| e.dir.is_absolute()));
        assert_eq!(output.icons.written.len(), 2);
    }

    #[test]
    fn entries_include_previously_registered_assets() {
        let tmp = TempDir::new().unwrap();
        let host = ManifestEntry::long_lived("/fonts", tmp.path().join("fonts"));
        let assets = PublicAssets::with_entries(vec![host.clone()]);

        let output = run_with(
            &MockBackend::new(),
            &MockCompiler::new(),
            &config_with_variants(Vec::new()),
            tmp.path(),
            &assets,
            None,
        )
        .unwrap();

        assert_eq!(output.entries.len(), 3);
        assert_eq!(output.entries[0], host);
    }

    #[test]
    fn service_worker_failure_is_fatal_after_icons_settle() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_variants(vec![maskable()]);
        let assets = PublicAssets::new();

        let result = run_with(
            &MockBackend::new(),
            &MockCompiler::failing(),
            &config,
            tmp.path(),
            &assets,
            None,
        );

        assert!(matches!(result, Err(PipelineError::ServiceWorker(_))));
        // Icons still ran to completion and registered
        let entries = assets.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].base_url, "/icons");
        assert!(entries[0].dir.join("icon-maskable-192.png").exists());
    }

    #[test]
    fn icon_failures_are_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut broken = maskable();
        broken.src = String::new();
        broken.prefix = "icon-broken-".into();
        let config = config_with_variants(vec![maskable(), broken]);

        let output = run_with(
            &MockBackend::new(),
            &MockCompiler::new(),
            &config,
            tmp.path(),
            &PublicAssets::new(),
            None,
        )
        .unwrap();

        assert_eq!(output.icons.failures.len(), 1);
        assert_eq!(output.entries.len(), 2);
        assert!(matches!(
            output.enforce_icon_policy(false),
            Err(PipelineError::IncompleteIcons { failed: 1 })
        ));
        assert!(output.enforce_icon_policy(true).is_ok());
    }

    #[test]
    fn invalid_config_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with_variants(vec![maskable()]);
        config.icons.sizes = Vec::new();
        let backend = MockBackend::new();
        let compiler = MockCompiler::new();
        let assets = PublicAssets::new();

        let result = run_with(&backend, &compiler, &config, tmp.path(), &assets, None);

        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert!(backend.get_operations().is_empty());
        assert!(compiler.get_requests().is_empty());
        assert!(assets.entries().is_empty());
    }

    #[test]
    fn events_arrive_from_both_generators() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_variants(vec![maskable()]);
        let (tx, rx) = std::sync::mpsc::channel();

        run_with(
            &MockBackend::new(),
            &MockCompiler::new(),
            &config,
            tmp.path(),
            &PublicAssets::new(),
            Some(&tx),
        )
        .unwrap();
        drop(tx);

        let events: Vec<PipelineEvent> = rx.iter().collect();
        let registered = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::AssetRegistered { .. }))
            .count();
        assert_eq!(registered, 2);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::IconWritten { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ServiceWorkerGenerated { .. })));
    }

    #[test]
    fn emit_without_sink_or_receiver_is_silent() {
        emit(None, PipelineEvent::IconWritten { file: "a.png".into() });
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        emit(Some(&tx), PipelineEvent::IconWritten { file: "a.png".into() });
    }

    #[test]
    fn incomplete_icons_message_mentions_override() {
        let err = PipelineError::IncompleteIcons { failed: 2 };
        assert!(err.to_string().contains("icons.allow_partial"));
    }
}
