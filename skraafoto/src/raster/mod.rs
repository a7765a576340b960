//! Partial reads of remote Cloud Optimized GeoTIFFs.
//!
//! A [`RangeReader`] turns byte-range requests into `Read + Seek`, and
//! [`CogRaster`] decodes only the chunks a [`PixelWindow`] touches. Together
//! they fetch a crop without downloading the whole image.

mod cog;
mod range_reader;
mod window;

pub use cog::CogRaster;
pub use range_reader::{
    HttpRangeSource, MemoryRangeSource, RangeReader, RangeSource, TransferStats,
    DEFAULT_READ_AHEAD,
};
pub use window::PixelWindow;

use std::io;

use thiserror::Error;

/// Errors from reading a raster.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Reading bytes from the source failed
    #[error("raster read failed: {0}")]
    Io(#[source] io::Error),

    /// The source was cancelled mid-read
    #[error("raster read cancelled")]
    Cancelled,

    /// The bytes are not a TIFF this reader understands
    #[error("invalid raster: {0}")]
    Format(String),

    #[error("unsupported sample format (only 8-bit samples are read)")]
    UnsupportedSampleFormat,

    #[error("unsupported band count {0}")]
    UnsupportedBands(usize),

    #[error("window {0:?} is outside the raster")]
    WindowOutOfBounds(PixelWindow),
}

impl RasterError {
    /// Whether retrying the read may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, RasterError::Io(_))
    }
}

/// Marker carried inside the `io::Error` of a cancelled range read.
#[derive(Debug)]
pub(crate) struct ReadCancelled;

impl std::fmt::Display for ReadCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("read cancelled")
    }
}

impl std::error::Error for ReadCancelled {}

fn is_cancelled(e: &io::Error) -> bool {
    e.get_ref().is_some_and(|inner| inner.is::<ReadCancelled>())
}

impl From<io::Error> for RasterError {
    fn from(e: io::Error) -> Self {
        if is_cancelled(&e) {
            RasterError::Cancelled
        } else {
            RasterError::Io(e)
        }
    }
}

impl From<tiff::TiffError> for RasterError {
    fn from(e: tiff::TiffError) -> Self {
        match e {
            tiff::TiffError::IoError(io) => io.into(),
            other => RasterError::Format(other.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory TIFF fixtures.

    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    /// Deterministic test pattern.
    pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    /// Encodes [`gradient_rgb`] as an uncompressed RGB TIFF with 16-row strips.
    pub fn striped_rgb_tiff(width: u32, height: u32) -> Vec<u8> {
        let img = gradient_rgb(width, height);
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).unwrap();
            let mut image = encoder.new_image::<colortype::RGB8>(width, height).unwrap();
            image.rows_per_strip(16).unwrap();
            image.write_data(img.as_raw()).unwrap();
        }
        buf.into_inner()
    }
}
