//! Windowed crop extraction and caching.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::opener::RasterOpener;
use super::{CropRequest, CropResult, FetchError};
use crate::coord::Direction;
use crate::raster::{CogRaster, PixelWindow};
use crate::retry::{with_retry, RetryError, RetryPolicy};

/// File name of crop `index` (1-based) for `direction`.
pub fn crop_file_name(direction: Direction, index: usize) -> String {
    format!("cropped_{}_box_{}.jpg", direction.as_str(), index)
}

/// Cuts the configured crop sizes out of remote rasters and writes them to disk.
pub struct TileFetcher<O: RasterOpener> {
    opener: Arc<O>,
    sizes: Arc<[u32]>,
    quality: u8,
    policy: RetryPolicy,
}

impl<O: RasterOpener> TileFetcher<O> {
    pub fn new(opener: Arc<O>, sizes: Vec<u32>, quality: u8, policy: RetryPolicy) -> Self {
        Self {
            opener,
            sizes: sizes.into(),
            quality: quality.clamp(1, 100),
            policy,
        }
    }

    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Reads every configured crop of one image, retrying transient failures.
    #[instrument(skip_all, fields(direction = %request.direction))]
    pub async fn fetch_crops(
        &self,
        request: &CropRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<CropResult>, RetryError<FetchError>> {
        let crops = with_retry(&self.policy, cancel, "fetch", |_| {
            self.fetch_once(request.clone(), cancel.clone())
        })
        .await?;
        debug!(count = crops.len(), "Crops written");
        Ok(crops)
    }

    async fn fetch_once(
        &self,
        request: CropRequest,
        cancel: CancellationToken,
    ) -> Result<Vec<CropResult>, FetchError> {
        let opener = Arc::clone(&self.opener);
        let sizes = Arc::clone(&self.sizes);
        let quality = self.quality;

        tokio::task::spawn_blocking(move || {
            extract_crops(opener.as_ref(), &sizes, quality, &request, &cancel)
        })
        .await
        .map_err(|e| FetchError::Decode(format!("crop worker failed: {}", e)))?
    }
}

/// Blocking body of a fetch: open, read each window, encode, write.
fn extract_crops<O: RasterOpener>(
    opener: &O,
    sizes: &[u32],
    quality: u8,
    request: &CropRequest,
    cancel: &CancellationToken,
) -> Result<Vec<CropResult>, FetchError> {
    let reader = opener.open(&request.image_url, cancel)?;
    let mut raster = CogRaster::open(reader)?;

    fs::create_dir_all(&request.dest_dir).map_err(|e| {
        FetchError::Cache(format!("{}: {}", request.dest_dir.display(), e))
    })?;

    let mut results = Vec::with_capacity(sizes.len());
    for (i, &size) in sizes.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let index = i + 1;

        let window = PixelWindow::centered(
            request.col,
            request.row,
            size,
            raster.width(),
            raster.height(),
        )
        .ok_or(FetchError::WindowOutsideRaster {
            col: request.col,
            row: request.row,
            size,
        })?;

        let img = raster.read_window(&window)?;
        let encoded = encode_jpeg(&img, quality)?;

        let path = request
            .dest_dir
            .join(crop_file_name(request.direction, index));
        write_atomic(&path, &encoded)?;

        results.push(CropResult {
            path,
            direction: request.direction,
            index,
            size,
            window,
        });
    }

    Ok(results)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .map_err(|e| FetchError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Writes through a temporary sibling so readers never see a partial file.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), FetchError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp: PathBuf = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, data)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| {
            let _ = fs::remove_file(&tmp);
            FetchError::Cache(format!("{}: {}", path.display(), e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::testing::striped_rgb_tiff;
    use crate::retry::Retryable;
    use crate::tile::MemoryRasterOpener;
    use std::time::Duration;

    const URL: &str = "https://cdn.test/north.tif";

    fn fetcher(sizes: Vec<u32>) -> TileFetcher<MemoryRasterOpener> {
        let mut opener = MemoryRasterOpener::new();
        opener.insert(URL, striped_rgb_tiff(600, 400));
        TileFetcher::new(
            Arc::new(opener),
            sizes,
            85,
            RetryPolicy::doubling(2, Duration::ZERO),
        )
    }

    fn request(dest: &Path, col: i64, row: i64) -> CropRequest {
        CropRequest {
            image_url: URL.to_string(),
            col,
            row,
            direction: Direction::North,
            dest_dir: dest.to_path_buf(),
        }
    }

    #[test]
    fn test_crop_file_name() {
        assert_eq!(crop_file_name(Direction::Nadir, 2), "cropped_nadir_box_2.jpg");
    }

    #[tokio::test]
    async fn test_fetch_writes_one_file_per_size() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(vec![64, 128, 256]);

        let crops = fetcher
            .fetch_crops(&request(dir.path(), 300, 200), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(crops.len(), 3);
        for (i, crop) in crops.iter().enumerate() {
            assert_eq!(crop.index, i + 1);
            assert!(crop.path.exists());
            let img = image::open(&crop.path).unwrap();
            assert_eq!(img.width(), crop.size);
            assert_eq!(img.height(), crop.size);
        }
        assert!(dir.path().join("cropped_north_box_3.jpg").exists());
    }

    #[tokio::test]
    async fn test_crop_clamped_at_edge() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(vec![100]);

        let crops = fetcher
            .fetch_crops(&request(dir.path(), 10, 390), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(crops[0].window.col_off, 0);
        assert_eq!(crops[0].window.row_off, 0);
        let img = image::open(&crops[0].path).unwrap();
        assert_eq!((img.width(), img.height()), (60, 60));
    }

    #[tokio::test]
    async fn test_window_outside_raster_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(vec![100]);

        let err = fetcher
            .fetch_crops(&request(dir.path(), -1000, 200), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 1);
        assert!(matches!(
            err.last_error(),
            Some(FetchError::WindowOutsideRaster { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_raster_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TileFetcher::new(
            Arc::new(MemoryRasterOpener::new()),
            vec![64],
            85,
            RetryPolicy::doubling(3, Duration::ZERO),
        );

        let err = fetcher
            .fetch_crops(&request(dir.path(), 0, 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert!(err.last_error().unwrap().is_retryable());
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let fetcher = fetcher(vec![96]);
        let cancel = CancellationToken::new();

        let first = fetcher.fetch_crops(&request(a.path(), 250, 150), &cancel).await.unwrap();
        let second = fetcher.fetch_crops(&request(b.path(), 250, 150), &cancel).await.unwrap();

        assert_eq!(
            fs::read(&first[0].path).unwrap(),
            fs::read(&second[0].path).unwrap()
        );
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.jpg");
        write_atomic(&path, b"data").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"data");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
