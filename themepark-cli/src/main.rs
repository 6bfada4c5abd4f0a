//! Theme Park CLI - per-theme ranking dashboards from a data manifest

// Global invariants enforced:
// - Deterministic output ordering
// - Every failure surfaces as one `error:` line and exit code 1

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use themepark_core::config::{self, ResolvedConfig};
use themepark_core::dashboard::{resolve_selection, SelectionRequest};
use themepark_core::manifest::{self, LoadedManifest, MANIFEST_FILENAME};
use themepark_core::selector::{display_date, pivot_target, prior_target};
use themepark_core::{html, render_dashboard, render_json, render_text, ThemeFilter};

#[derive(Parser)]
#[command(name = "themepark")]
#[command(about = "Per-theme ranking dashboard built from rank, pivot and taxonomy files")]
#[command(version = env!("THEMEPARK_VERSION"))]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the dashboard for one rank period
    Render {
        /// Path to manifest.json
        #[arg(long, default_value = MANIFEST_FILENAME)]
        manifest: PathBuf,

        /// Current rank period: list index, display date or filename (default: manifest default)
        #[arg(long)]
        current: Option<String>,

        /// Prior rank period (default: closest to one month before current)
        #[arg(long)]
        prior: Option<String>,

        /// Pivot period: list index, display month or filename (default: matched to current)
        #[arg(long)]
        pivot: Option<String>,

        /// Show portfolio and other members in one combined column
        #[arg(long)]
        no_separate_portfolio: bool,

        /// Disable highlighting of notable members
        #[arg(long)]
        no_highlight: bool,

        /// Which themes to show (overrides config file)
        #[arg(long)]
        themes: Option<ThemesArg>,

        /// Output format
        #[arg(long, default_value = "html")]
        format: OutputFormat,

        /// Output file path (for HTML format, default: themepark.html next to the manifest)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to config file (default: auto-discover next to the manifest)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show which prior-rank and pivot periods pair with a current period
    Match {
        /// Path to manifest.json
        #[arg(long, default_value = MANIFEST_FILENAME)]
        manifest: PathBuf,

        /// Current rank period (default: manifest default)
        #[arg(long)]
        current: Option<String>,

        /// Path to config file (default: auto-discover next to the manifest)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Scan a data directory and write manifest.json
    Manifest {
        /// Data directory containing eom_price/ and final/
        data_dir: PathBuf,

        /// Manifest path (default: manifest.json in the data directory's parent)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without rendering
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Html,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ThemesArg {
    All,
    Portfolio,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Render {
            manifest: manifest_path,
            current,
            prior,
            pivot,
            no_separate_portfolio,
            no_highlight,
            themes,
            format,
            output,
            config: config_path,
        } => {
            let loaded = manifest::load_manifest(&manifest_path)?;
            let mut resolved = load_config(&loaded, config_path.as_deref())?;

            // CLI flags override config file values
            if no_separate_portfolio {
                resolved.aggregate.separate_portfolio = false;
            }
            if no_highlight {
                resolved.aggregate.highlight = false;
            }
            if let Some(themes) = themes {
                resolved.theme_filter = match themes {
                    ThemesArg::All => ThemeFilter::All,
                    ThemesArg::Portfolio => ThemeFilter::Portfolio,
                };
            }

            let request = SelectionRequest {
                current: current.as_deref(),
                prior: prior.as_deref(),
                pivot: pivot.as_deref(),
            };
            let dashboard = render_dashboard(&loaded, &request, &resolved)?;

            match format {
                OutputFormat::Html => {
                    let html = html::render_html_dashboard(&dashboard);
                    let path = output.unwrap_or_else(|| loaded.base_dir.join("themepark.html"));
                    manifest::atomic_write(&path, &html)?;
                    println!("HTML report written to: {}", path.display());
                }
                OutputFormat::Text => emit(&render_text(&dashboard), output.as_deref())?,
                OutputFormat::Json => emit(&render_json(&dashboard), output.as_deref())?,
            }
        }
        Commands::Match {
            manifest: manifest_path,
            current,
            config: config_path,
        } => {
            let loaded = manifest::load_manifest(&manifest_path)?;
            let resolved = load_config(&loaded, config_path.as_deref())?;
            let request = SelectionRequest {
                current: current.as_deref(),
                ..SelectionRequest::default()
            };
            let selection =
                resolve_selection(&loaded.manifest, &request, resolved.pivot_cutoff_day)?;

            let files = &loaded.manifest;
            let current_file = &files.rank_files[selection.current];
            let target = pivot_target(&current_file.date, resolved.pivot_cutoff_day);
            println!(
                "Current: {} ({})",
                current_file.display, current_file.filename
            );
            match (selection.prior, prior_target(&current_file.date)) {
                (Some(idx), Some(wanted)) => println!(
                    "Prior:   {} ({})  target {}",
                    files.rank_files[idx].display,
                    files.rank_files[idx].filename,
                    display_date(wanted)
                ),
                _ => println!("Prior:   none"),
            }
            let pivot_file = &files.pivot_files[selection.pivot];
            let target = target
                .map(|t| format!("{:04}-{:02}", t.year, t.month))
                .unwrap_or_else(|| "none".to_string());
            println!(
                "Pivot:   {} ({})  target {}",
                pivot_file.display, pivot_file.filename, target
            );
        }
        Commands::Manifest { data_dir, output } => {
            let output = output.unwrap_or_else(|| {
                data_dir
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .join(MANIFEST_FILENAME)
            });
            let manifest_dir = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));

            let generated = manifest::generate_manifest(&data_dir, manifest_dir)?;
            manifest::write_manifest(&output, &generated)?;

            println!("Wrote {}", output.display());
            println!("  - {} rank files", generated.rank_files.len());
            println!("  - {} pivot files", generated.pivot_files.len());
            if let Some(ref current) = generated.defaults.current_rank {
                println!("  - Current: {}", current.display);
            }
            if let Some(ref prev) = generated.defaults.prev_rank {
                println!("  - Previous: {}", prev.display);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let root = std::env::current_dir()?;
                match config::load_and_resolve(&root, path.as_deref()) {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => anyhow::bail!("config validation failed: {:#}", e),
                }
            }
            ConfigAction::Show { path } => {
                let root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&root, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

/// Resolve config next to the manifest, announcing where it came from
fn load_config(loaded: &LoadedManifest, config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let resolved = config::load_and_resolve(&loaded.base_dir, config_path)?;
    if let Some(ref p) = resolved.config_path {
        eprintln!("Using config: {}", p.display());
    }
    Ok(resolved)
}

/// Write to `output` atomically, or to stdout
fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            manifest::atomic_write(path, content)?;
            eprintln!("Report written to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Layout:");
    println!("  separate_portfolio: {}", resolved.aggregate.separate_portfolio);
    println!("  highlight:          {}", resolved.aggregate.highlight);
    println!("  highlight_score:    {}", resolved.aggregate.highlight_score);
    println!("  missing_prior:      {:?}", resolved.aggregate.missing_prior);
    match &resolved.theme_filter {
        ThemeFilter::All => println!("  themes:             all"),
        ThemeFilter::Portfolio => println!("  themes:             portfolio"),
        ThemeFilter::Custom(names) => println!("  themes:             {}", names.join(", ")),
    }
    println!();
    println!("Sources:");
    println!("  codex sheet:        {}", resolved.codex_sheet);
    println!("  portfolio sheet:    {}", resolved.portfolio_sheet);
    println!("  pivot sheet:        {}", resolved.pivot_sheet);
    println!("  value prefix:       {}", resolved.pivot.value_prefix);
    println!("  window:             {}", resolved.pivot.window);
    println!("  pivot cutoff day:   {}", resolved.pivot_cutoff_day);
}
