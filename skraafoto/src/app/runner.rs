//! Batch run wiring.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::AppError;
use crate::config::ConfigFile;
use crate::coord::{read_coordinates, Coordinate};
use crate::orchestrator::{ConcurrencyController, ControllerSettings, ProgressCallback};
use crate::provider::{ElevationClient, ImageSearchClient, ReqwestClient};
use crate::report::{RunReporter, RunSummary};
use crate::retry::RetryPolicy;
use crate::summary::SummaryComposer;
use crate::tile::{HttpRasterOpener, TileFetcher};

/// Runs one batch from a loaded configuration.
///
/// The HTTP client and every component built on it live for a single
/// [`BatchRunner::run`] call and are dropped on every exit path.
pub struct BatchRunner {
    config: ConfigFile,
}

impl BatchRunner {
    pub fn new(config: ConfigFile) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Reads the input file, failing when it holds no valid coordinate.
    pub fn load_coordinates(path: &Path) -> Result<Vec<Coordinate>, AppError> {
        let coordinates = read_coordinates(path)?;
        if coordinates.is_empty() {
            return Err(AppError::NoCoordinates(path.to_path_buf()));
        }
        info!(count = coordinates.len(), file = %path.display(), "Loaded coordinates");
        Ok(coordinates)
    }

    /// Processes `coordinates`, then writes the recovery file and summary log.
    ///
    /// Cancelling `cancel` stops admission and winds down in-flight jobs; the
    /// report is still written.
    pub async fn run(
        &self,
        coordinates: &[Coordinate],
        cancel: CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Result<RunSummary, AppError> {
        let cfg = &self.config;
        let http = Arc::new(
            ReqwestClient::new(cfg.concurrency.limit_per_host).map_err(AppError::HttpClient)?,
        );
        let policy = RetryPolicy::from_settings(&cfg.retry);

        let elevation = ElevationClient::new(
            Arc::clone(&http),
            cfg.api.elevation_url.clone(),
            cfg.api.username.clone().unwrap_or_default(),
            cfg.api.password.clone().unwrap_or_default(),
            policy.clone(),
        );
        let search = ImageSearchClient::new(
            Arc::clone(&http),
            cfg.api.search_url.clone(),
            cfg.api.token.clone(),
            policy.clone(),
        );
        let opener = HttpRasterOpener::new(Arc::clone(&http), Handle::current());
        let fetcher = TileFetcher::new(
            Arc::new(opener),
            cfg.crop.sizes.clone(),
            cfg.crop.quality,
            policy,
        );
        let summary = SummaryComposer::new(cfg.crop.summary, cfg.crop.summary_size);

        let mut settings = ControllerSettings::new(cfg.cache.directory.clone());
        settings.max_concurrent = cfg.concurrency.max_concurrent_requests;
        settings.threshold = cfg.run.threshold;
        settings.zero_is_nodata = cfg.elevation.zero_is_nodata;

        let mut controller = ConcurrencyController::new(elevation, search, fetcher, summary, settings)
            .with_cancellation(cancel);
        if let Some(callback) = on_progress {
            controller = controller.with_progress(callback);
        }

        let outcome = controller.run(coordinates, &cfg.run.collection).await;
        drop(controller);

        let reporter = RunReporter::new(cfg.run.recovery_file.clone())
            .with_summary_file(cfg.run.summary_file.clone());
        Ok(reporter.report(&outcome.snapshot, outcome.aborted)?)
    }
}
