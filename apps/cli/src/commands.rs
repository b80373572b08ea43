//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use siteforge_core::pipeline::{BuildConfig, BuildReport, ProgressReporter};
use siteforge_core::writer;
use siteforge_shared::{
    BuildPhase, DESCRIPTOR_FILE_NAME, PRECACHE_FILE_NAME, init_descriptor, load_descriptor,
    load_precache_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Siteforge — build optimized static web applications.
#[derive(Parser)]
#[command(
    name = "siteforge",
    version,
    about = "Minify, downlevel, bundle, and manifest a static web app into a build directory.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full build pipeline.
    Build {
        /// Project root directory (defaults to the current directory).
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Project descriptor path (defaults to <root>/siteforge.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Offline-cache configuration path (defaults to <root>/precache.toml).
        #[arg(long)]
        precache_config: Option<PathBuf>,

        /// Output directory, overriding the descriptor's build.dir.
        #[arg(short, long)]
        out: Option<String>,

        /// Force bundling on, overriding the descriptor.
        #[arg(long, conflicts_with = "no_bundle")]
        bundle: bool,

        /// Force bundling off, overriding the descriptor.
        #[arg(long)]
        no_bundle: bool,
    },

    /// Remove the build output directory.
    Clean {
        /// Project root directory (defaults to the current directory).
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Project descriptor path (defaults to <root>/siteforge.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default project descriptor into the current directory.
    Init {
        /// Entry markup file the descriptor should point at.
        #[arg(long, default_value = "index.html")]
        entrypoint: String,
    },
    /// Show the resolved project descriptor.
    Show {
        /// Project descriptor path (defaults to ./siteforge.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

/// Per-crate filter directives for the given `-v` count. Workspace crate
/// targets are underscore-separated (`siteforge_core`, not `siteforge::`),
/// so each crate needs its own directive.
fn filter_directives(verbose: u8) -> String {
    const TARGETS: &[&str] = &[
        "siteforge",
        "siteforge_shared",
        "siteforge_assets",
        "siteforge_transform",
        "siteforge_artifacts",
        "siteforge_core",
    ];
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            root,
            config,
            precache_config,
            out,
            bundle,
            no_bundle,
        } => {
            cmd_build(
                root.as_deref(),
                config.as_deref(),
                precache_config.as_deref(),
                out.as_deref(),
                bundle,
                no_bundle,
            )
            .await
        }
        Command::Clean { root, config } => cmd_clean(root.as_deref(), config.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init { entrypoint } => cmd_config_init(&entrypoint).await,
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn resolve_root(root: Option<&Path>) -> Result<PathBuf> {
    match root {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))
        }
    }
}

async fn cmd_build(
    root: Option<&Path>,
    config: Option<&Path>,
    precache_config: Option<&Path>,
    out: Option<&str>,
    bundle: bool,
    no_bundle: bool,
) -> Result<()> {
    let root = resolve_root(root)?;

    let descriptor_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(DESCRIPTOR_FILE_NAME));
    let mut descriptor = load_descriptor(&descriptor_path)?;

    // CLI overrides beat descriptor values.
    if let Some(dir) = out {
        descriptor.build.dir = dir.to_string();
    }
    if bundle {
        descriptor.build.bundle = true;
    }
    if no_bundle {
        descriptor.build.bundle = false;
    }
    descriptor.validate()?;

    let precache_path = precache_config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(PRECACHE_FILE_NAME));
    let precache = load_precache_config(&precache_path)?;

    info!(
        root = %root.display(),
        entrypoint = %descriptor.entrypoint,
        out = %descriptor.build.dir,
        bundle = descriptor.build.bundle,
        "starting build"
    );

    let build_config = BuildConfig::new(root, descriptor, precache);
    let reporter = CliProgress::new();
    let report = siteforge_core::build(&build_config, &reporter).await?;

    println!();
    println!("  Build complete!");
    println!("  Output:  {}", report.out_dir.display());
    println!("  Files:   {}", report.files_written);
    println!("  Bundled: {}", if report.bundled { "yes" } else { "no" });
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_clean(root: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let root = resolve_root(root)?;
    let descriptor_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(DESCRIPTOR_FILE_NAME));
    let descriptor = load_descriptor(&descriptor_path)?;

    let out_dir = root.join(&descriptor.build.dir);
    writer::clean(&out_dir)?;

    println!("Cleaned {}", out_dir.display());
    Ok(())
}

async fn cmd_config_init(entrypoint: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = init_descriptor(&cwd, entrypoint)?;
    println!("Project descriptor created at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: Option<&Path>) -> Result<()> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DESCRIPTOR_FILE_NAME));
    let descriptor = load_descriptor(&path)?;
    let toml_str = toml::to_string_pretty(&descriptor)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: BuildPhase) {
        let label = match phase {
            BuildPhase::Cleaning => "Cleaning previous output",
            BuildPhase::Processing => "Transforming assets",
            BuildPhase::Merging => "Merging asset groups",
            BuildPhase::Adapting => "Injecting runtime adapters",
            BuildPhase::Bundling => "Bundling entry references",
            BuildPhase::Manifesting => "Generating push manifest",
            BuildPhase::Writing => "Writing output",
            BuildPhase::CacheGenerating => "Generating offline cache",
            _ => return,
        };
        self.spinner.set_message(label);
    }

    fn item_processed(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Transforming [{current}/{total}] {url}"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
