//! One coordinate job: elevation, per-direction fan-out, summary.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{
    job_failure, CropSource, DirectionOutcome, ElevationSource, ImageSearch, JobFailure,
};
use crate::coord::{Coordinate, Direction};
use crate::projection::{project, PixelCoordinate};
use crate::provider::SearchResult;
use crate::summary::SummaryComposer;
use crate::tile::{CropRequest, FetchError};

/// Components and settings shared by every job of a run.
pub(crate) struct Pipeline<E, S, F> {
    pub elevation: E,
    pub search: S,
    pub crops: F,
    pub summary: SummaryComposer,
    pub cache_root: PathBuf,
    pub zero_is_nodata: bool,
    pub directions: Vec<Direction>,
}

/// Crops written by a successful job.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JobReport {
    pub crops: usize,
    pub directions_without_coverage: usize,
}

impl<E, S, F> Pipeline<E, S, F>
where
    E: ElevationSource,
    S: ImageSearch,
    F: CropSource,
{
    /// Runs one coordinate through the pipeline.
    ///
    /// `cancel` is the job's token; it is a child of the run token, so a
    /// run-wide cancellation reaches every stage.
    pub async fn process(
        self: Arc<Self>,
        coordinate: Coordinate,
        collection: Arc<str>,
        cancel: CancellationToken,
    ) -> Result<JobReport, JobFailure> {
        let sample = self
            .elevation
            .elevation(coordinate, &cancel)
            .await
            .map_err(|e| job_failure(e, JobFailure::Elevation))?;

        let Some(kote) = sample.valid_kote(self.zero_is_nodata) else {
            debug!(%coordinate, kote = ?sample.kote, "Bad elevation, skipping search");
            return Err(JobFailure::InvalidElevation { kote: sample.kote });
        };

        let outcomes = self
            .clone()
            .fan_out(coordinate, kote, collection, cancel.clone())
            .await?;

        let crops: usize = outcomes
            .iter()
            .map(|o| match o {
                DirectionOutcome::Cropped(c) => c.len(),
                _ => 0,
            })
            .sum();
        let directions_without_coverage = outcomes
            .iter()
            .filter(|o| !matches!(o, DirectionOutcome::Cropped(_)))
            .count();

        if crops == 0 {
            return Err(JobFailure::NoCoverage);
        }

        if self.summary.is_enabled() {
            let composer = self.summary.clone();
            let dir = coordinate.cache_dir(&self.cache_root);
            // Composition problems are logged by the composer and never fail the job
            if let Err(e) = tokio::task::spawn_blocking(move || composer.compose(&dir)).await {
                warn!(%coordinate, error = %e, "Summary task failed");
            }
        }

        Ok(JobReport {
            crops,
            directions_without_coverage,
        })
    }

    /// Runs every direction concurrently; the first hard error cancels the rest.
    async fn fan_out(
        self: Arc<Self>,
        coordinate: Coordinate,
        kote: f64,
        collection: Arc<str>,
        cancel: CancellationToken,
    ) -> Result<Vec<DirectionOutcome>, JobFailure> {
        let siblings = cancel.child_token();
        let mut tasks = JoinSet::new();

        for &direction in &self.directions {
            let pipeline = Arc::clone(&self);
            let collection = Arc::clone(&collection);
            let token = siblings.clone();
            tasks.spawn(async move {
                pipeline
                    .direction(coordinate, kote, direction, &collection, &token)
                    .await
            });
        }

        let mut outcomes = Vec::with_capacity(self.directions.len());
        let mut first_error: Option<JobFailure> = None;

        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(JobFailure::Internal(e.to_string())));
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(failure) if failure.is_cancelled() => {}
                Err(failure) => {
                    if first_error.is_none() {
                        debug!(%coordinate, error = %failure, "Cancelling sibling directions");
                        siblings.cancel();
                        first_error = Some(failure);
                    }
                }
            }
        }

        if let Some(failure) = first_error {
            return Err(failure);
        }
        if cancel.is_cancelled() {
            return Err(JobFailure::Cancelled);
        }
        Ok(outcomes)
    }

    async fn direction(
        &self,
        coordinate: Coordinate,
        kote: f64,
        direction: Direction,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectionOutcome, JobFailure> {
        let found = self
            .search
            .search(coordinate, direction, collection, cancel)
            .await
            .map_err(|e| job_failure(e, |source| JobFailure::Search { direction, source }))?;

        let item = match found {
            SearchResult::Found(item) => item,
            SearchResult::NoCoverage => return Ok(DirectionOutcome::NoCoverage),
        };

        let (col, row) = match project(coordinate.easting, coordinate.northing, kote, &item.camera)
        {
            PixelCoordinate::Pixel { col, row } => (col, row),
            PixelCoordinate::ProjectionFailed => {
                warn!(%coordinate, %direction, item = %item.id, "Ground point does not project into image");
                return Ok(DirectionOutcome::Unprojectable);
            }
        };

        let request = CropRequest {
            image_url: item.asset_url,
            col,
            row,
            direction,
            dest_dir: coordinate.cache_dir(&self.cache_root),
        };

        match self.crops.fetch_crops(&request, cancel).await {
            Ok(crops) => Ok(DirectionOutcome::Cropped(crops)),
            // Geometry miss, like a failed projection: skip the direction only
            Err(e) if matches!(e.last_error(), Some(FetchError::WindowOutsideRaster { .. })) => {
                warn!(%coordinate, %direction, item = %item.id, col, row, "Projected pixel lies outside the raster");
                Ok(DirectionOutcome::Unprojectable)
            }
            Err(e) => Err(job_failure(e, |source| JobFailure::Fetch { direction, source })),
        }
    }
}
