//! Application error types.

use std::fmt;
use std::path::PathBuf;

use crate::coord::CoordError;
use crate::provider::HttpError;
use crate::report::ReportError;

/// Errors that stop a batch run from starting or finishing.
#[derive(Debug)]
pub enum AppError {
    /// The coordinate file could not be read.
    Coordinates(CoordError),

    /// The coordinate file holds no valid line.
    NoCoordinates(PathBuf),

    /// The shared HTTP client could not be built.
    HttpClient(HttpError),

    /// Writing the recovery file or summary log failed.
    Report(ReportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Coordinates(e) => write!(f, "Failed to load coordinates: {}", e),
            AppError::NoCoordinates(path) => {
                write!(f, "No valid coordinates found in {}", path.display())
            }
            AppError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            AppError::Report(e) => write!(f, "Failed to write run report: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Coordinates(e) => Some(e),
            AppError::NoCoordinates(_) => None,
            AppError::HttpClient(e) => Some(e),
            AppError::Report(e) => Some(e),
        }
    }
}

impl From<CoordError> for AppError {
    fn from(e: CoordError) -> Self {
        AppError::Coordinates(e)
    }
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        AppError::Report(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NoCoordinates(PathBuf::from("coords.txt"));
        assert!(err.to_string().contains("No valid coordinates"));
        assert!(err.to_string().contains("coords.txt"));
    }

    #[test]
    fn test_app_error_from_coord_error() {
        let err: AppError = CoordError::MalformedLine("x".into()).into();
        assert!(matches!(err, AppError::Coordinates(_)));
    }
}
