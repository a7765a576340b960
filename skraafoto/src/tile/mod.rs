//! Crop extraction for one image.
//!
//! Given the URL of a remote Cloud Optimized GeoTIFF and the pixel a ground
//! point projects to, [`TileFetcher`] reads one square window per configured
//! crop size, re-encodes it as JPEG and writes it into the coordinate's
//! cache directory as `cropped_<direction>_box_<i>.jpg`.

mod fetcher;
mod opener;

pub use fetcher::{crop_file_name, TileFetcher};
pub use opener::{HttpRasterOpener, MemoryRasterOpener, RasterOpener};

use std::path::PathBuf;

use thiserror::Error;

use crate::coord::Direction;
use crate::provider::HttpError;
use crate::raster::{PixelWindow, RasterError};
use crate::retry::Retryable;

/// What to crop and where to put it.
#[derive(Debug, Clone)]
pub struct CropRequest {
    pub image_url: String,
    /// Projected column
    pub col: i64,
    /// Projected row, counted from the bottom edge
    pub row: i64,
    pub direction: Direction,
    pub dest_dir: PathBuf,
}

/// One crop written to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CropResult {
    pub path: PathBuf,
    pub direction: Direction,
    /// 1-based position in the configured size list
    pub index: usize,
    pub size: u32,
    pub window: PixelWindow,
}

/// Errors from a single crop attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The raster could not be read from its source
    #[error("raster transfer failed: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("raster decode failed: {0}")]
    Decode(String),

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("cache write failed: {0}")]
    Cache(String),

    #[error("crop of {size}px around ({col}, {row}) misses the raster")]
    WindowOutsideRaster { col: i64, row: i64, size: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<RasterError> for FetchError {
    fn from(e: RasterError) -> Self {
        match e {
            RasterError::Io(io) => {
                let status = io
                    .get_ref()
                    .and_then(|inner| inner.downcast_ref::<HttpError>())
                    .and_then(|http| http.http_status());
                FetchError::Transport {
                    message: io.to_string(),
                    status,
                }
            }
            RasterError::Cancelled => FetchError::Cancelled,
            other => FetchError::Decode(other.to_string()),
        }
    }
}
