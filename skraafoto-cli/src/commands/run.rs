//! Run command - process a coordinate file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::{style, Term};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use skraafoto::app::BatchRunner;
use skraafoto::config::ConfigFile;
use skraafoto::logging::init_logging;
use skraafoto::orchestrator::ProgressCallback;
use skraafoto::report::{subtract_lines, RunProgress, RunSummary};

use crate::error::CliError;

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// File with one "<easting> <northing>" pair (EPSG:25832) per line
    #[arg(short, long)]
    pub file: PathBuf,

    /// Config file to use instead of ~/.skraafoto/config.ini
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Image collection to search, overriding the config
    #[arg(long)]
    pub collection: Option<String>,

    /// Skip the per-coordinate summary image
    #[arg(long)]
    pub no_summary: bool,

    /// Never ask to remove failed coordinates from the input file
    #[arg(long)]
    pub no_prompt: bool,
}

/// Runs the batch and returns the process exit code.
pub fn execute(args: RunArgs) -> Result<i32, CliError> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    if let Some(collection) = &args.collection {
        config.run.collection = collection.clone();
    }
    if args.no_summary {
        config.crop.summary = false;
    }

    let interactive = Term::stderr().is_term();
    let _logging = init_logging(
        &config.logging.directory,
        &config.logging.file,
        &config.logging.level,
        !interactive,
    )
    .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let coordinates = BatchRunner::load_coordinates(&args.file)?;
    info!(collection = %config.run.collection, "Configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || on_signal.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    let bar = progress_bar(coordinates.len() as u64, interactive);
    let progress = bar.clone();
    let on_progress: ProgressCallback = Arc::new(move |counters: &RunProgress| {
        progress.set_position(counters.processed() as u64);
    });

    let runner = BatchRunner::new(config);
    let summary = runtime.block_on(runner.run(&coordinates, cancel, Some(on_progress)));
    bar.finish_and_clear();
    let summary = summary?;

    print_summary(&summary);

    if summary.failed > 0 && interactive && !args.no_prompt {
        offer_prune(&args.file, &summary.recovery_file)?;
    }

    Ok(if summary.aborted { 1 } else { 0 })
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(
        "Progress: {pos}/{len} ({percent}%) [{bar:40.cyan/blue}] {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    ProgressBar::new(total).with_style(style)
}

fn print_summary(summary: &RunSummary) {
    if summary.aborted {
        println!("{}", style("Run stopped before completion").red().bold());
    } else {
        println!("{}", style("Run complete").green().bold());
    }
    print!("{}", summary);
    if summary.failed > 0 {
        println!(
            "Failed coordinates written to {}",
            summary.recovery_file.display()
        );
    }
}

fn offer_prune(input: &Path, recovery: &Path) -> Result<(), CliError> {
    let remove = Confirm::new()
        .with_prompt("Do you want to remove failed coordinates from the input file?")
        .default(false)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))?;

    if remove {
        let removed = subtract_lines(input, recovery, input)?;
        println!("Removed {} coordinate(s) from {}", removed, input.display());
    }
    Ok(())
}
