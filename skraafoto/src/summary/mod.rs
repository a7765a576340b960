//! Per-coordinate composite of the cached crops.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, warn};

/// File name of the composite inside a coordinate's cache directory.
pub const SUMMARY_FILE_NAME: &str = "summary_image.png";

/// What [`SummaryComposer::compose`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Composition is switched off
    Disabled,
    /// The directory holds no crops
    NoCrops,
    Written(PathBuf),
    /// Composition failed; the job is not affected
    Failed(String),
}

/// Concatenates every cached crop of a coordinate into one strip.
///
/// Crops are ordered by file name and scaled to `tile_size` squares. An
/// existing summary is rebuilt from the crops currently on disk.
#[derive(Debug, Clone)]
pub struct SummaryComposer {
    enabled: bool,
    tile_size: u32,
}

impl SummaryComposer {
    pub fn new(enabled: bool, tile_size: u32) -> Self {
        Self {
            enabled,
            tile_size: tile_size.max(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds `summary_image.png` in `cache_dir`. Never returns an error.
    pub fn compose(&self, cache_dir: &Path) -> SummaryOutcome {
        if !self.enabled {
            return SummaryOutcome::Disabled;
        }

        match self.try_compose(cache_dir) {
            Ok(Some(path)) => {
                debug!(path = %path.display(), "Summary image written");
                SummaryOutcome::Written(path)
            }
            Ok(None) => SummaryOutcome::NoCrops,
            Err(reason) => {
                warn!(dir = %cache_dir.display(), error = %reason, "Summary composition failed");
                SummaryOutcome::Failed(reason)
            }
        }
    }

    fn try_compose(&self, cache_dir: &Path) -> Result<Option<PathBuf>, String> {
        let crops = list_crops(cache_dir).map_err(|e| e.to_string())?;
        if crops.is_empty() {
            return Ok(None);
        }

        let size = self.tile_size;
        let width = size
            .checked_mul(crops.len() as u32)
            .ok_or_else(|| "summary image too wide".to_string())?;
        let mut canvas = RgbImage::new(width, size);

        for (i, path) in crops.iter().enumerate() {
            let tile = image::open(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?
                .to_rgb8();
            let scaled = imageops::resize(&tile, size, size, FilterType::Triangle);
            imageops::replace(&mut canvas, &scaled, i as i64 * i64::from(size), 0);
        }

        let out = cache_dir.join(SUMMARY_FILE_NAME);
        canvas.save(&out).map_err(|e| e.to_string())?;
        Ok(Some(out))
    }
}

/// Cached crop files in `dir`, sorted by file name.
fn list_crops(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut crops: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("cropped_") && n.ends_with(".jpg"))
        })
        .collect();
    crops.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(crops)
}
