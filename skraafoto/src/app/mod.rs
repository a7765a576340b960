//! Batch run entry point.
//!
//! [`BatchRunner`] builds the shared HTTP client and the pipeline components
//! from a [`ConfigFile`](crate::config::ConfigFile), runs the
//! [`ConcurrencyController`](crate::orchestrator::ConcurrencyController) and
//! hands its final snapshot to the reporter.
//!
//! # Example
//!
//! ```ignore
//! use skraafoto::app::BatchRunner;
//!
//! let runner = BatchRunner::new(ConfigFile::load()?);
//! let coordinates = BatchRunner::load_coordinates(&path)?;
//! let summary = runner.run(&coordinates, cancel, None).await?;
//! println!("{}", summary);
//! ```

mod error;
mod runner;

pub use error::AppError;
pub use runner::BatchRunner;
