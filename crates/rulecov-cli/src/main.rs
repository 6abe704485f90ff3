//! rulecov - coverage checker for PMD Apex XPath rules.
//!
//! Walks rule files, checks that each rule's examples exercise every part of
//! its XPath and reports the gaps with their lines.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rulecov_core::{CoverageConfig, ProjectReport, check_paths};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "RULECOV_LOG";

/// Exit code when every rule is covered.
const EXIT_COVERED: u8 = 0;
/// Exit code when at least one branch is uncovered.
const EXIT_UNCOVERED: u8 = 1;
/// Exit code for usage, config and I/O problems.
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "rulecov", author, version, about, long_about = None)]
struct Cli {
    /// Rule files or directories to check
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Path to a .rulecov.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List hardcoded literals found in each rule's XPath
    #[arg(long)]
    show_hardcoded: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init only happens in tests; ignore it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(cli: &Cli) -> anyhow::Result<CoverageConfig> {
    let (config, warning) = CoverageConfig::load_or_default(cli.config.as_ref());
    if let Some(warning) = warning {
        // An explicit config that cannot be read is a usage error.
        anyhow::bail!(warning);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: &Cli) -> anyhow::Result<ProjectReport> {
    let config = load_config(cli)?;
    tracing::debug!(paths = ?cli.paths, "checking rule files");
    let report = check_paths(&cli.paths, &config).context("failed to check rule files")?;
    Ok(report)
}

fn exit_code(report: &ProjectReport) -> u8 {
    if !report.failures.is_empty() {
        EXIT_ERROR
    } else if report.overall_success() {
        EXIT_COVERED
    } else {
        EXIT_UNCOVERED
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let report = match run(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {e:#}", output::error_label());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let rendered = match cli.format {
        OutputFormat::Text => Ok(output::format_text(&report, cli.show_hardcoded)),
        OutputFormat::Json => output::format_json(&report),
    };
    match rendered {
        Ok(text) => {
            print!("{text}");
            ExitCode::from(exit_code(&report))
        }
        Err(e) => {
            eprintln!("{} {e:#}", output::error_label());
            ExitCode::from(EXIT_ERROR)
        }
    }
}
