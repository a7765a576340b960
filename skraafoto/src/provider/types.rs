//! Provider types

use std::fmt;

use crate::coord::{Coordinate, Direction};
use crate::projection::CameraModel;
use crate::retry::Retryable;

/// Elevation value the terrain service uses for "no data".
pub const NODATA_SENTINEL: f64 = -9999.0;

/// Errors from the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpError {
    /// URL could not be parsed
    InvalidUrl(String),
    /// Server answered with a non-success status
    Status { status: u16 },
    /// Connection, timeout or body read failure
    Transport(String),
    /// Client construction failed
    Client(String),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            HttpError::Status { status } => write!(f, "HTTP status {}", status),
            HttpError::Transport(msg) => write!(f, "Request failed: {}", msg),
            HttpError::Client(msg) => write!(f, "HTTP client error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Status { .. } | HttpError::Transport(_))
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Terrain elevation ("kote") at a coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationSample {
    pub coordinate: Coordinate,
    /// Metres above the reference geoid; `None` when the service had no value
    pub kote: Option<f64>,
}

impl ElevationSample {
    /// The elevation if it is usable for projection.
    ///
    /// Missing values and the no-data sentinel are never usable; exactly
    /// zero is rejected when `zero_is_nodata` is set.
    pub fn valid_kote(&self, zero_is_nodata: bool) -> Option<f64> {
        match self.kote {
            Some(k) if !k.is_finite() || k == NODATA_SENTINEL => None,
            Some(k) if zero_is_nodata && k == 0.0 => None,
            other => other,
        }
    }
}

/// Catalogue image chosen for one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub id: String,
    pub direction: Direction,
    pub camera: CameraModel,
    /// Cloud Optimized GeoTIFF URL
    pub asset_url: String,
}

/// Outcome of a catalogue search for one direction.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Found(ImageItem),
    /// No image in the collection covers the point from this direction
    NoCoverage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kote: Option<f64>) -> ElevationSample {
        ElevationSample {
            coordinate: Coordinate::new(1.0, 2.0),
            kote,
        }
    }

    #[test]
    fn test_valid_kote() {
        assert_eq!(sample(Some(10.0)).valid_kote(true), Some(10.0));
        assert_eq!(sample(Some(-3.5)).valid_kote(true), Some(-3.5));
    }

    #[test]
    fn test_invalid_kote() {
        assert_eq!(sample(None).valid_kote(true), None);
        assert_eq!(sample(Some(NODATA_SENTINEL)).valid_kote(false), None);
        assert_eq!(sample(Some(f64::NAN)).valid_kote(false), None);
    }

    #[test]
    fn test_zero_kote_configurable() {
        assert_eq!(sample(Some(0.0)).valid_kote(true), None);
        assert_eq!(sample(Some(0.0)).valid_kote(false), Some(0.0));
    }

    #[test]
    fn test_http_error_retryable() {
        assert!(HttpError::Status { status: 503 }.is_retryable());
        assert!(HttpError::Transport("reset".into()).is_retryable());
        assert!(!HttpError::InvalidUrl("x".into()).is_retryable());
        assert_eq!(HttpError::Status { status: 429 }.http_status(), Some(429));
        assert_eq!(HttpError::Transport("x".into()).http_status(), None);
    }
}
