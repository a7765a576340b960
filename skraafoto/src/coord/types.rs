//! Coordinate type definitions

use std::fmt;
use std::path::PathBuf;

/// EPSG code of the projected CRS all ground coordinates are expressed in
/// (ETRS89 / UTM zone 32N).
pub const GROUND_CRS_EPSG: u32 = 25832;

/// A ground coordinate in EPSG:25832.
///
/// One coordinate identifies one job of a batch run. It is created once
/// when the input file is loaded and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Easting in metres
    pub easting: f64,
    /// Northing in metres
    pub northing: f64,
}

impl Coordinate {
    /// Creates a coordinate from an easting/northing pair.
    #[inline]
    pub const fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Name of the cache directory holding this coordinate's crops.
    ///
    /// Formatted as `<easting>_<northing>`.
    pub fn cache_dir_name(&self) -> String {
        format!("{}_{}", self.easting, self.northing)
    }

    /// Cache directory for this coordinate under `root`.
    pub fn cache_dir(&self, root: &std::path::Path) -> PathBuf {
        root.join(self.cache_dir_name())
    }

    /// The coordinate as a well-known-text point.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.easting, self.northing)
    }
}

/// Formats as `<easting> <northing>`, the input and recovery file line format.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.easting, self.northing)
    }
}

/// Viewing direction of a capture.
///
/// Four oblique compass directions plus the vertical (nadir) view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Nadir,
}

impl Direction {
    /// All directions, in the order jobs fan out over them.
    pub const ALL: [Direction; 5] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Nadir,
    ];

    /// Name used by the image catalogue and in cache file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Nadir => "nadir",
        }
    }

    /// Whether this is one of the four oblique views.
    pub fn is_oblique(&self) -> bool {
        !matches!(self, Direction::Nadir)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "north" => Ok(Direction::North),
            "south" => Ok(Direction::South),
            "east" => Ok(Direction::East),
            "west" => Ok(Direction::West),
            "nadir" => Ok(Direction::Nadir),
            other => Err(CoordError::UnknownDirection(other.to_string())),
        }
    }
}

/// Errors from coordinate handling.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    /// The coordinate file could not be read.
    #[error("failed to read coordinate file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line did not hold exactly two floating point values.
    #[error("malformed coordinate line: '{0}'")]
    MalformedLine(String),

    /// Direction name not recognised.
    #[error("unknown direction: '{0}'")]
    UnknownDirection(String),
}
