//! Skraafoto CLI - Command-line interface
//!
//! Downloads cropped oblique and nadir aerial images around a batch of
//! ground coordinates.

mod commands;
mod error;

use std::process;

use clap::{Parser, Subcommand};

use commands::prune::PruneArgs;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "skraafoto")]
#[command(version = skraafoto::VERSION)]
#[command(about = "Crop aerial imagery around ground coordinates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every coordinate in a file
    Run(RunArgs),
    /// Remove the coordinates of a recovery file from an input file
    Prune(PruneArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Prune(args) => commands::prune::execute(args),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => e.exit(),
    }
}
