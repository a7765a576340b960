//! Prune command - drop recovered coordinates from an input file.

use std::path::PathBuf;

use clap::Args;

use skraafoto::config::DEFAULT_RECOVERY_FILE;
use skraafoto::report::subtract_lines;

use crate::error::CliError;

/// Arguments for the prune command.
#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Coordinate file to filter
    #[arg(short, long)]
    pub input: PathBuf,

    /// Recovery file listing the lines to remove
    #[arg(short, long, default_value = DEFAULT_RECOVERY_FILE)]
    pub recovery: PathBuf,

    /// Where to write the result (defaults to overwriting the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: PruneArgs) -> Result<i32, CliError> {
    let output = args.output.as_ref().unwrap_or(&args.input);
    let removed = subtract_lines(&args.input, &args.recovery, output)?;
    println!(
        "Removed {} coordinate(s); result written to {}",
        removed,
        output.display()
    );
    Ok(0)
}
