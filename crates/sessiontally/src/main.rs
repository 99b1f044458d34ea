mod config;
mod output;
mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use sessiontally_core::ConflictPolicy;
use sessiontally_logging::{init_tracing, LogFormat, Logger};
use sessiontally_store::{CarryOverFile, MalformedLines};

use config::{ProjectConfig, StrayHandling};
use run::RunSettings;

#[derive(Parser, Debug)]
#[command(
    name = "sessiontally",
    about = "Average per-user session duration from open/close action logs",
    version,
    author
)]
struct Cli {
    /// Log files to process, in order
    #[arg(required = true)]
    log_files: Vec<PathBuf>,

    /// How to resolve an open for a user who already has one pending
    #[arg(short, long, value_enum)]
    policy: Option<PolicyChoice>,

    /// What to do with events that could not be paired
    #[arg(short, long, value_enum)]
    strays: Option<StrayChoice>,

    /// Carry-over file (default: data dir, or `carry_over` in sessiontally.toml)
    #[arg(long)]
    carry_over: Option<PathBuf>,

    /// Seed the run with pending opens from the carry-over file
    #[arg(long)]
    read_carry_over: bool,

    /// Write the remaining pending opens to the carry-over file
    #[arg(long)]
    write_carry_over: bool,

    /// Write stray events as JSON lines to this file (report mode)
    #[arg(long)]
    stray_report: Option<PathBuf>,

    /// Skip malformed log lines instead of failing
    #[arg(long)]
    skip_malformed: bool,

    /// Working directory holding sessiontally.toml (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormatChoice>,

    /// Tracing level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Also append run events as JSON to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output the result as JSON
    #[arg(long)]
    json: bool,

    /// Dry run: show the resolved settings without processing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyChoice {
    KeepLatestOpen,
    KeepEarliestOpen,
    CloseOnReopen,
}

impl From<PolicyChoice> for ConflictPolicy {
    fn from(choice: PolicyChoice) -> Self {
        match choice {
            PolicyChoice::KeepLatestOpen => ConflictPolicy::KeepLatestOpen,
            PolicyChoice::KeepEarliestOpen => ConflictPolicy::KeepEarliestOpen,
            PolicyChoice::CloseOnReopen => ConflictPolicy::CloseOnReopen,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrayChoice {
    Discard,
    Count,
    Report,
}

impl From<StrayChoice> for StrayHandling {
    fn from(choice: StrayChoice) -> Self {
        match choice {
            StrayChoice::Discard => StrayHandling::Discard,
            StrayChoice::Count => StrayHandling::Count,
            StrayChoice::Report => StrayHandling::Report,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let log_format = config.log_format(cli.log_format.map(Into::into))?;
    init_tracing(&config.log_level(cli.log_level.as_deref()), log_format);

    let settings = resolve_settings(&cli, &config)?;

    if cli.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let logger = match log_file {
        Some(path) => Logger::with_file(log_format, &path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let summary = run::execute(&settings, &logger)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::print_summary(&summary);
    }

    Ok(())
}

fn resolve_settings(cli: &Cli, config: &ProjectConfig) -> Result<RunSettings> {
    let policy = config.policy(cli.policy.map(Into::into))?;
    let strays = config.strays(cli.strays.map(Into::into))?;

    let carry_over = match cli.carry_over.clone().or_else(|| config.carry_over.clone()) {
        Some(path) => path,
        None => CarryOverFile::default_path()?,
    };

    let malformed = if config.skip_malformed(cli.skip_malformed) {
        MalformedLines::Skip
    } else {
        MalformedLines::Reject
    };

    let stray_report = cli.stray_report.clone().or_else(|| config.stray_report.clone());
    if stray_report.is_some() && strays != StrayHandling::Report {
        tracing::warn!("Stray report path is ignored unless strays = report");
    }

    Ok(RunSettings {
        log_files: cli.log_files.clone(),
        policy,
        strays,
        carry_over,
        read_carry_over: cli.read_carry_over,
        write_carry_over: cli.write_carry_over,
        stray_report,
        malformed,
    })
}

fn print_dry_run(settings: &RunSettings) {
    println!("=== Dry Run ===");
    for path in &settings.log_files {
        println!("Log file: {}", path.display());
    }
    println!("Policy: {}", settings.policy);
    println!("Strays: {:?}", settings.strays);
    println!(
        "Carry-over: {} (read: {}, write: {})",
        settings.carry_over.display(),
        settings.read_carry_over,
        settings.write_carry_over
    );
    if let Some(ref report) = settings.stray_report {
        println!("Stray report: {}", report.display());
    }
    println!("Malformed lines: {:?}", settings.malformed);
}
