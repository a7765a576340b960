//! CLI command implementations.
//!
//! - [`run`] - Process a coordinate file
//! - [`prune`] - Remove failed coordinates from an input file

pub mod prune;
pub mod run;
