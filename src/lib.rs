//! # pwa-assets
//!
//! Build-time asset derivation for a web application. Before the host build
//! finalizes its serving configuration, this crate:
//!
//! - resizes configured source icons into every target size (optionally
//!   flattened onto an opaque background), and
//! - compiles an offline-caching service worker with a fixed table of
//!   runtime caching rules and a precache of the host's static output,
//!
//! then registers both output folders as public assets (route prefix,
//! absolute directory, one-year max-age).
//!
//! # Architecture: Two Generators, One Join
//!
//! ```text
//!                      ┌─ icons ──────────  .build/icons/          → /icons
//! run_asset_pipeline ──┤
//!                      └─ service_worker ─  .build/serviceworker/  → /
//!                                    ↓
//!                          PublicAssets (Mutex<Vec<ManifestEntry>>)
//! ```
//!
//! The generators share nothing but the registrar, so they run as the two
//! halves of a `rayon::join`. Inside the icon generator every variant and
//! every size is its own rayon task. Registration happens after a
//! generator's tasks have all been joined, so a registered folder is always
//! complete on disk.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Entry point: runs both generators, progress events, failure policy |
//! | [`icons`] | Icon variant generation and per-variant failure reporting |
//! | [`service_worker`] | Stale chunk cleanup, compiler seam, caching rules, precache globbing |
//! | [`manifest`] | Public-asset registrar and `public-assets.json` |
//! | [`config`] | `assets.toml` loading, stock defaults, merging, validation |
//! | [`imaging`] | Pure-Rust image operations behind the [`imaging::ImageBackend`] trait |
//! | [`output`] | CLI output formatting for progress, plans and rule lookups |
//!
//! # Design Decisions
//!
//! ## Failures Are Collected, Not Swallowed
//!
//! A broken icon variant (no source, unreadable image, failed write) does not
//! stop its siblings, and it does not disappear either: it is sent as a
//! progress event, returned in [`icons::IconReport::failures`], and fails the
//! CLI build unless `icons.allow_partial` is set. A service worker that cannot
//! be compiled or written fails the run outright.
//!
//! ## Capabilities at the Seams
//!
//! Pixel work goes through [`imaging::ImageBackend`] and worker compilation
//! through [`service_worker::WorkerCompiler`]. Production code uses
//! [`imaging::RustBackend`] and [`service_worker::BuiltinCompiler`]; tests use
//! recording mocks, so generator logic is tested without decoding images.
//!
//! ## The Rule Table Is a Value
//!
//! [`service_worker::CACHING_RULES`] is a `static`. The same table answers
//! `pwa-assets match <url>` and is serialized verbatim into the worker, where
//! the runtime applies it with identical pathname matching.

pub mod config;
pub mod icons;
pub mod imaging;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod service_worker;

pub use pipeline::{PipelineError, PipelineEvent, PipelineOutput, run_asset_pipeline, run_with};
