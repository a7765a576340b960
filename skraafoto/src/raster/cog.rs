//! Windowed reads from tiled or stripped GeoTIFFs.

use std::io::{Read, Seek};

use image::RgbImage;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tracing::trace;

use super::window::PixelWindow;
use super::RasterError;

/// An open GeoTIFF whose full-resolution image can be read window by window.
///
/// Only the chunks (tiles or strips) intersecting a requested window are
/// decoded, so with a [`super::RangeReader`] underneath only their bytes are
/// fetched.
pub struct CogRaster<R: Read + Seek> {
    decoder: Decoder<R>,
    width: u32,
    height: u32,
}

impl<R: Read + Seek> CogRaster<R> {
    /// Parses the header and first image directory.
    pub fn open(reader: R) -> Result<Self, RasterError> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions()?;

        trace!(width, height, "Opened raster");
        Ok(Self {
            decoder,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reads `window` as an RGB image.
    ///
    /// Grey is replicated into three bands, alpha is dropped.
    pub fn read_window(&mut self, window: &PixelWindow) -> Result<RgbImage, RasterError> {
        if window.width == 0
            || window.height == 0
            || window.col_end() > self.width
            || window.row_end() > self.height
        {
            return Err(RasterError::WindowOutOfBounds(*window));
        }

        let (chunk_w, chunk_h) = self.decoder.chunk_dimensions();
        if chunk_w == 0 || chunk_h == 0 {
            return Err(RasterError::Format("zero chunk dimensions".to_string()));
        }
        let chunks_across = self.width.div_ceil(chunk_w);

        let mut out = RgbImage::new(window.width, window.height);

        let first_cx = window.col_off / chunk_w;
        let last_cx = (window.col_end() - 1) / chunk_w;
        let first_cy = window.row_off / chunk_h;
        let last_cy = (window.row_end() - 1) / chunk_h;

        for cy in first_cy..=last_cy {
            for cx in first_cx..=last_cx {
                let index = cy * chunks_across + cx;
                let (data_w, data_h) = self.decoder.chunk_data_dimensions(index);
                let data = match self.decoder.read_chunk(index)? {
                    DecodingResult::U8(data) => data,
                    _ => return Err(RasterError::UnsupportedSampleFormat),
                };

                let chunk_x0 = cx * chunk_w;
                let chunk_y0 = cy * chunk_h;
                copy_chunk(
                    &data,
                    (chunk_x0, chunk_y0, data_w, data_h),
                    window,
                    &mut out,
                )?;
            }
        }

        Ok(out)
    }
}

/// Copies the part of one decoded chunk that overlaps `window` into `out`.
///
/// The band count is derived from the decoded buffer size.
fn copy_chunk(
    data: &[u8],
    (chunk_x0, chunk_y0, data_w, data_h): (u32, u32, u32, u32),
    window: &PixelWindow,
    out: &mut RgbImage,
) -> Result<(), RasterError> {
    let pixels = data_w as usize * data_h as usize;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(RasterError::Format(format!(
            "chunk of {}x{} holds {} bytes",
            data_w,
            data_h,
            data.len()
        )));
    }
    let samples = data.len() / pixels;
    if !(1..=4).contains(&samples) {
        return Err(RasterError::UnsupportedBands(samples));
    }
    let row_stride = data_w as usize * samples;

    let x_start = window.col_off.max(chunk_x0);
    let x_end = window.col_end().min(chunk_x0 + data_w);
    let y_start = window.row_off.max(chunk_y0);
    let y_end = window.row_end().min(chunk_y0 + data_h);

    for y in y_start..y_end {
        let row = &data[(y - chunk_y0) as usize * row_stride..][..row_stride];
        for x in x_start..x_end {
            let px = &row[(x - chunk_x0) as usize * samples..][..samples];
            let rgb = match samples {
                1 | 2 => [px[0], px[0], px[0]],
                _ => [px[0], px[1], px[2]],
            };
            out.put_pixel(x - window.col_off, y - window.row_off, image::Rgb(rgb));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::testing::{gradient_rgb, striped_rgb_tiff};
    use crate::raster::{MemoryRangeSource, RangeReader};
    use std::io::Cursor;

    #[test]
    fn test_open_reports_dimensions() {
        let tiff = striped_rgb_tiff(300, 200);
        let raster = CogRaster::open(Cursor::new(tiff)).unwrap();
        assert_eq!(raster.width(), 300);
        assert_eq!(raster.height(), 200);
    }

    #[test]
    fn test_read_window_matches_source_pixels() {
        let (width, height) = (300, 200);
        let tiff = striped_rgb_tiff(width, height);
        let expected = gradient_rgb(width, height);
        let mut raster = CogRaster::open(Cursor::new(tiff)).unwrap();

        let window = PixelWindow {
            col_off: 37,
            row_off: 51,
            width: 80,
            height: 60,
        };
        let img = raster.read_window(&window).unwrap();

        assert_eq!(img.dimensions(), (80, 60));
        for (x, y, px) in img.enumerate_pixels() {
            assert_eq!(px, expected.get_pixel(x + 37, y + 51));
        }
    }

    #[test]
    fn test_window_out_of_bounds() {
        let tiff = striped_rgb_tiff(100, 100);
        let mut raster = CogRaster::open(Cursor::new(tiff)).unwrap();
        let window = PixelWindow {
            col_off: 90,
            row_off: 0,
            width: 20,
            height: 10,
        };
        assert!(matches!(
            raster.read_window(&window),
            Err(RasterError::WindowOutOfBounds(_))
        ));
    }

    #[test]
    fn test_garbage_is_format_error() {
        let result = CogRaster::open(Cursor::new(b"not a tiff at all".to_vec()));
        assert!(result.is_err());
    }

    #[test]
    fn test_only_intersecting_chunks_transferred() {
        let (width, height) = (1024, 1024);
        let tiff = striped_rgb_tiff(width, height);
        let file_len = tiff.len() as u64;

        let source = MemoryRangeSource::new(tiff);
        let stats = source.stats();
        let mut raster = CogRaster::open(RangeReader::with_read_ahead(source, 4096)).unwrap();

        let window = PixelWindow {
            col_off: 10,
            row_off: 10,
            width: 32,
            height: 32,
        };
        raster.read_window(&window).unwrap();

        assert!(
            stats.bytes() < file_len / 4,
            "transferred {} of {} bytes",
            stats.bytes(),
            file_len
        );
    }
}
