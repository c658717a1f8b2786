//! driverclaw - fetch a catalog of drivers and tools and pack them
//!
//! Usage:
//!   driverclaw                         Download everything in catalog.toml
//!   driverclaw -c vendors.json -o out  Use another catalog and output directory
//!   driverclaw -r                      Retry the downloads that failed last time
//!   driverclaw -x                      Skip packing the result

use anyhow::{Context, Result};
use clap::Parser;
use driverclaw::core::progress;
use driverclaw::organize::{NativeZipPacker, Packer, SevenZip};
use driverclaw::{
    CancelToken, Catalog, ErrorPolicy, ExtractorKind, LedgerError, Orchestrator, RunError,
    RunMode, RunReport, Settings, output,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "driverclaw")]
#[command(about = "Download vendor drivers and tools into one tidy folder and archive")]
#[command(version)]
struct Cli {
    /// Catalog of items to acquire (.toml or .json)
    #[arg(short, long, default_value = "catalog.toml")]
    catalog: PathBuf,

    /// Directory the downloads are organized into
    #[arg(short, long, default_value = "drivers")]
    output_dir: PathBuf,

    /// What to do when a download fails
    #[arg(short, long, value_enum, default_value_t = ErrorPolicy::Log)]
    error_handling: ErrorPolicy,

    /// Retry the downloads recorded as failed by the previous run
    #[arg(short, long)]
    retry_failed: bool,

    /// Do not pack the output directory
    #[arg(short = 'x', long)]
    no_archive: bool,

    /// Name of the archive to create
    #[arg(short = 'n', long, default_value = "driver-pack.zip")]
    archive_name: PathBuf,

    /// Compression level, 0 (store) to 9 (best)
    #[arg(short = 'l', long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=9))]
    compress_level: u8,

    /// Extra files or directories to pack alongside the output directory
    #[arg(short = 'f', long, num_args = 1..)]
    include_files: Vec<PathBuf>,

    /// Settings file, applied after the XDG config files
    #[arg(long, env = "DRIVERCLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DRIVERCLAW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    tracing::debug!(?settings, "settings resolved");

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        output::warning("Interrupted, finishing the current step...");
        handler_token.cancel();
    })
    .context("Failed to set Ctrl-C handler")?;

    let orchestrator = Orchestrator::new(&cli.output_dir, &settings, cancel);

    let result = if cli.retry_failed {
        match orchestrator.retry(cli.error_handling) {
            Err(RunError::Ledger(LedgerError::NotFound(_))) => {
                output::info("Nothing to retry.");
                return Ok(ExitCode::FAILURE);
            }
            other => other,
        }
    } else {
        let catalog = Catalog::load(&cli.catalog)?;
        for warning in catalog.validate()? {
            output::warning(&warning);
        }
        for name in orchestrator.unknown_strategies(&catalog) {
            output::warning(&format!("No resolver for strategy '{}'; its items will fail", name));
        }
        orchestrator.run(&catalog, cli.error_handling, RunMode::Fresh)
    };

    let report = match result {
        Ok(report) => report,
        Err(e @ RunError::Aborted { .. }) => {
            output::error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    if !summarize(&report, &orchestrator) {
        return Ok(ExitCode::FAILURE);
    }

    if cli.no_archive {
        return Ok(ExitCode::SUCCESS);
    }

    let mut sources: Vec<&Path> = vec![cli.output_dir.as_path()];
    sources.extend(cli.include_files.iter().map(PathBuf::as_path));
    pack(&settings, &cli.archive_name, &sources, cli.compress_level)
}

/// Print the end-of-run summary. Returns false when the run must exit nonzero.
fn summarize(report: &RunReport, orchestrator: &Orchestrator) -> bool {
    let failed = report.failures.len();
    if failed > 0 {
        output::error(&format!("Total of {} download(s) failed.", failed));
        output::info(&format!(
            "Run again with -r to retry them (recorded in {}).",
            orchestrator.ledger().path().display()
        ));
        return false;
    }
    if report.cancelled {
        output::warning("Run cancelled before all items were attempted.");
        return false;
    }

    output::success(&format!(
        "{} of {} item(s) acquired",
        report.succeeded, report.attempted
    ));
    true
}

fn pack(settings: &Settings, archive: &Path, sources: &[&Path], level: u8) -> Result<ExitCode> {
    let packer: Box<dyn Packer> = match settings.extractor {
        ExtractorKind::Native => Box::new(NativeZipPacker),
        ExtractorKind::SevenZip => Box::new(SevenZip::new(&settings.seven_zip)),
    };

    output::action(&format!("Packing into {}", archive.display()));
    let status = progress::with_spinner("compressing", || packer.pack(archive, sources, level))
        .with_context(|| format!("Failed to create {}", archive.display()))?;

    if status != 0 {
        output::error(&format!("Archive tool exited with status {}", status));
        return Ok(ExitCode::FAILURE);
    }

    output::success(&format!("Created {}", archive.display()));
    Ok(ExitCode::SUCCESS)
}
