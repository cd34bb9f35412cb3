//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build progress
//!
//! ```text
//! public/icon.png → icons/ (7 sizes)
//!     icon-maskable-64.png
//!     icon-maskable-120.png
//!     failed: icon-apple-192.png (from public/icon.png): failed to write icon: ...
//! Removed stale sw-runtime-1a2b3c4d.js
//! Service worker → serviceworker.js (1 chunk, 42 precached)
//! Registered /icons → /app/.build/icons (max-age 31536000)
//! Registered / → /app/.build/serviceworker (max-age 31536000)
//! ```
//!
//! ## Check
//!
//! ```text
//! Icons → /app/.build/icons (served at /icons)
//!     icon-maskable- from public/icon.png: 64 120 144 152 192 384 512
//! Service worker → /app/.build/serviceworker/serviceworker.js (served at /)
//!     Precache root: /app/.output/public
//!     Navigation preload: on
//!     Source map: off
//! ```
//!
//! ## Match
//!
//! ```text
//! /styles.css → StaleWhileRevalidate
//!     Matched by: extension .js .json .css
//!     Cache: code
//!     Cacheable statuses: 0 200
//! ```
//!
//! # Architecture
//!
//! Every display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::{PipelineConfig, PipelinePaths};
use crate::manifest::ManifestEntry;
use crate::pipeline::{PipelineEvent, PipelineOutput};
use crate::service_worker::rules::{CachingRule, DEFAULT_RUNTIME_CACHE};
use std::path::Path;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// ============================================================================
// Build progress
// ============================================================================

/// Format one progress event.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::IconVariantStarted {
            src,
            sizes,
            output_folder,
        } => vec![format!(
            "{} \u{2192} {}/ ({})",
            src,
            output_folder.trim_matches('/'),
            plural(sizes.len(), "size")
        )],
        PipelineEvent::IconWritten { file } => vec![format!("    {}", file)],
        PipelineEvent::IconFailed { message } => vec![format!("    failed: {}", message)],
        PipelineEvent::StaleChunkRemoved { path } => {
            vec![format!("Removed stale {}", file_name(path))]
        }
        PipelineEvent::StaleChunkKept { path, reason } => {
            vec![format!("    warning: kept stale {}: {}", file_name(path), reason)]
        }
        PipelineEvent::ServiceWorkerWarning { message } => {
            vec![format!("    warning: {}", message)]
        }
        PipelineEvent::ServiceWorkerGenerated {
            script,
            chunks,
            precached,
        } => vec![format!(
            "Service worker \u{2192} {} ({}, {} precached)",
            file_name(script),
            plural(*chunks, "chunk"),
            precached
        )],
        PipelineEvent::AssetRegistered { entry } => vec![format!(
            "Registered {} \u{2192} {} (max-age {})",
            entry.base_url,
            entry.dir.display(),
            entry.max_age
        )],
    }
}

/// Format the registered public-asset list.
pub fn format_entries(entries: &[ManifestEntry]) -> Vec<String> {
    let mut lines = vec!["Public assets".to_string()];
    if entries.is_empty() {
        lines.push("    (none)".to_string());
    }
    for entry in entries {
        lines.push(format!(
            "    {} \u{2192} {} (max-age {})",
            entry.base_url,
            entry.dir.display(),
            entry.max_age
        ));
    }
    lines
}

/// One-line totals for a finished run.
pub fn format_summary(output: &PipelineOutput) -> Vec<String> {
    let icons = &output.icons;
    let sw = &output.service_worker;
    let mut line = format!(
        "Generated {}, service worker with {} precached",
        plural(icons.written.len(), "icon"),
        plural(sw.precached, "file")
    );
    if !icons.failures.is_empty() {
        line.push_str(&format!(", {} failed", plural(icons.failures.len(), "icon")));
    }
    if !sw.cleanup.failures.is_empty() {
        line.push_str(&format!(
            ", {} not cleaned up",
            plural(sw.cleanup.failures.len(), "stale chunk")
        ));
    }
    vec![line]
}

pub fn print_entries(entries: &[ManifestEntry]) {
    for line in format_entries(entries) {
        println!("{}", line);
    }
}

pub fn print_summary(output: &PipelineOutput) {
    for line in format_summary(output) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the resolved plan: where everything goes and what gets generated.
pub fn format_plan(config: &PipelineConfig, paths: &PipelinePaths) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!(
        "Icons \u{2192} {} (served at /{})",
        paths.icons_dir.display(),
        config.icons.folder()
    ));
    if config.icons.variants.is_empty() {
        lines.push("    (no variants configured)".to_string());
    }
    for variant in &config.icons.variants {
        let src = if variant.src.is_empty() {
            "<no source>"
        } else {
            &variant.src
        };
        let sizes: Vec<String> = variant
            .effective_sizes(&config.icons.sizes)
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut line = format!("    {} from {}: {}", variant.prefix, src, sizes.join(" "));
        if let Some(color) = variant.bg_color {
            line.push_str(&format!(" on {}", color));
        }
        lines.push(line);
    }
    if !config.icons.variants.is_empty() {
        let files = config.icons.planned_files().len();
        lines.push(format!("    {} in total", plural(files, "file")));
    }

    let sw = &config.service_worker;
    lines.push(format!(
        "Service worker \u{2192} {} (served at /)",
        paths.service_worker_dir.join(&sw.sw_path).display()
    ));
    lines.push(format!("    Precache root: {}", paths.static_dir.display()));
    lines.push(format!("    Navigation preload: {}", on_off(sw.navigation_preload)));
    lines.push(format!("    Source map: {}", on_off(sw.sourcemap)));
    lines
}

pub fn print_plan(config: &PipelineConfig, paths: &PipelinePaths) {
    for line in format_plan(config, paths) {
        println!("{}", line);
    }
}

// ============================================================================
// Match
// ============================================================================

/// Format which caching rule applies to `url`.
pub fn format_rule_match(url: &str, rule: Option<&CachingRule>) -> Vec<String> {
    let Some(rule) = rule else {
        return vec![format!("{} \u{2192} no rule (not cached at runtime)", url)];
    };
    let statuses: Vec<String> = rule.statuses.iter().map(|s| s.to_string()).collect();
    vec![
        format!("{} \u{2192} {}", url, rule.strategy),
        format!("    Matched by: {}", rule.matcher),
        format!(
            "    Cache: {}",
            rule.cache_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} (default)", DEFAULT_RUNTIME_CACHE))
        ),
        format!("    Cacheable statuses: {}", statuses.join(" ")),
    ]
}

pub fn print_rule_match(url: &str, rule: Option<&CachingRule>) {
    for line in format_rule_match(url, rule) {
        println!("{}", line);
    }
}
