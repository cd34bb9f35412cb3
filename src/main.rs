use clap::{Parser, Subcommand};
use pwa_assets::{config, manifest, output, pipeline, service_worker};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pwa-assets")]
#[command(about = "Build-time icon variants and service worker for a web app")]
#[command(long_about = "\
Build-time icon variants and service worker for a web app

Run as a step of the host build, after the host has produced its static
output. Generates resized icons and an offline-caching service worker, then
lists both output folders for the host to serve.

Output layout:

  .build/
  ├── icons/                    # served at /icons, max-age one year
  │   ├── icon-maskable-64.png
  │   └── ...
  ├── serviceworker/            # served at /, max-age one year
  │   ├── serviceworker.js
  │   └── sw-runtime-<hash>.js
  └── public-assets.json        # [{ baseURL, dir, maxAge }, ...]

Run 'pwa-assets gen-config' to generate a documented assets.toml.")]
#[command(version)]
struct Cli {
    /// Project root; relative paths in the config resolve against it
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file [default: <root>/assets.toml, optional]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate icons and the service worker, then write public-assets.json
    Build,
    /// Validate the config and show what a build would produce
    Check,
    /// Print a stock assets.toml with all options documented
    GenConfig,
    /// Show the runtime caching rule that applies to a URL
    Match {
        /// Absolute URL or site path, e.g. /styles.css
        url: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("pwa_assets=warn"),
        1 => EnvFilter::new("pwa_assets=info"),
        _ => EnvFilter::new("pwa_assets=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build => {
            let config = load_config(&cli.root, cli.config.as_deref())?;
            let paths = config.paths(&cli.root)?;
            init_thread_pool(&config.processing);

            println!("==> Building assets into {}", paths.build_root.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = pipeline::run_asset_pipeline(&config, &cli.root, Some(&tx));
            drop(tx);
            if printer.join().is_err() {
                debug!("progress printer exited early");
            }
            let result = result?;

            output::print_entries(&result.entries);
            let written = manifest::write_public_assets(&paths.build_root, &result.entries)?;
            println!("Wrote {}", written.display());
            output::print_summary(&result);

            result.enforce_icon_policy(config.icons.allow_partial)?;
            println!("==> Build complete");
        }
        Command::Check => {
            let config = load_config(&cli.root, cli.config.as_deref())?;
            let paths = config.paths(&cli.root)?;
            println!("==> Checking {}", paths.root.display());
            output::print_plan(&config, &paths);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Match { url } => {
            let rule = service_worker::resolve_rule(&url);
            output::print_rule_match(&url, rule);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// An explicit `--config` must exist; the default `<root>/assets.toml` may not.
fn load_config(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<config::PipelineConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::load_required_config(path),
        None => config::load_config(&root.join(config::CONFIG_FILENAME)),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
