//! Ground coordinates and viewing directions
//!
//! Provides the [`Coordinate`] job key, the five [`Direction`]s a location
//! is photographed from, and the loader for newline-delimited coordinate
//! files.

mod types;

pub use types::{CoordError, Coordinate, Direction, GROUND_CRS_EPSG};

use std::path::Path;

use tracing::warn;

/// Parses one input line of the form `<easting> <northing>`.
///
/// Any amount of whitespace may separate the two values. Lines with more
/// or fewer fields, or values that are not finite numbers, are rejected.
pub fn parse_line(line: &str) -> Result<Coordinate, CoordError> {
    let mut fields = line.split_whitespace();
    let (Some(e), Some(n), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(CoordError::MalformedLine(line.trim().to_string()));
    };

    let easting: f64 = e
        .parse()
        .map_err(|_| CoordError::MalformedLine(line.trim().to_string()))?;
    let northing: f64 = n
        .parse()
        .map_err(|_| CoordError::MalformedLine(line.trim().to_string()))?;

    if !easting.is_finite() || !northing.is_finite() {
        return Err(CoordError::MalformedLine(line.trim().to_string()));
    }

    Ok(Coordinate::new(easting, northing))
}

/// Parses coordinates from file contents.
///
/// Produces exactly one coordinate per well-formed line. Malformed lines are
/// skipped with a warning, blank lines silently.
pub fn parse_coordinates(contents: &str) -> Vec<Coordinate> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match parse_line(line) {
            Ok(coord) => Some(coord),
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping invalid line in coordinate file");
                None
            }
        })
        .collect()
}

/// Reads all coordinates from a newline-delimited text file.
///
/// Only failing to read the file itself is an error; bad lines never are.
pub fn read_coordinates(path: &Path) -> Result<Vec<Coordinate>, CoordError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CoordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_coordinates(&contents))
}
