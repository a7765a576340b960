//! Bounded admission of coordinate jobs and the run-wide breaker.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::job::Pipeline;
use super::types::{CropSource, ElevationSource, ImageSearch, ProgressCallback, RunOutcome};
use crate::coord::{Coordinate, Direction};
use crate::report::{RecordOutcome, RunState};
use crate::summary::SummaryComposer;

/// Run-level settings of a [`ConcurrencyController`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Coordinate jobs in flight at once
    pub max_concurrent: usize,
    /// Failure percentage at which the run stops
    pub threshold: f64,
    pub cache_root: PathBuf,
    /// Treat an elevation of exactly zero as missing data
    pub zero_is_nodata: bool,
    pub directions: Vec<Direction>,
}

impl ControllerSettings {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrent: crate::config::DEFAULT_MAX_CONCURRENT_REQUESTS,
            threshold: crate::config::DEFAULT_THRESHOLD_PERCENT,
            cache_root: cache_root.into(),
            zero_is_nodata: true,
            directions: Direction::ALL.to_vec(),
        }
    }
}

/// Drives a batch of coordinates through the pipeline.
///
/// Admission is gated by a semaphore of `max_concurrent` permits. Each job
/// looks up the elevation, fans out one task per direction and composes
/// the summary; its outcome goes into the shared [`RunState`]. When the
/// breaker trips, the run token is cancelled: admission stops and
/// in-flight jobs wind down without being recorded.
pub struct ConcurrencyController<E, S, F> {
    pipeline: Arc<Pipeline<E, S, F>>,
    max_concurrent: usize,
    threshold: f64,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl<E, S, F> ConcurrencyController<E, S, F>
where
    E: ElevationSource,
    S: ImageSearch,
    F: CropSource,
{
    pub fn new(
        elevation: E,
        search: S,
        crops: F,
        summary: SummaryComposer,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                elevation,
                search,
                crops,
                summary,
                cache_root: settings.cache_root,
                zero_is_nodata: settings.zero_is_nodata,
                directions: settings.directions,
            }),
            max_concurrent: settings.max_concurrent.max(1),
            threshold: settings.threshold,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Uses `token` as the run token, e.g. one wired to Ctrl-C.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Processes `coordinates` and returns the final run record.
    #[instrument(skip_all, fields(total = coordinates.len(), %collection))]
    pub async fn run(&self, coordinates: &[Coordinate], collection: &str) -> RunOutcome {
        let state = Arc::new(RunState::new(coordinates.len(), self.threshold));
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let collection: Arc<str> = Arc::from(collection);
        let mut jobs = JoinSet::new();

        info!(max_concurrent = self.max_concurrent, "Starting run");

        for &coordinate in coordinates {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let pipeline = Arc::clone(&self.pipeline);
            let state = Arc::clone(&state);
            let collection = Arc::clone(&collection);
            let run_token = self.cancel.clone();
            let on_progress = self.on_progress.clone();

            jobs.spawn(async move {
                let _permit = permit;
                let job_token = run_token.child_token();
                let result = pipeline.process(coordinate, collection, job_token).await;

                let outcome = match result {
                    Ok(report) => {
                        debug!(
                            %coordinate,
                            crops = report.crops,
                            missing_directions = report.directions_without_coverage,
                            "Coordinate processed"
                        );
                        state.record_success()
                    }
                    Err(failure) if failure.is_cancelled() => return,
                    Err(failure) => {
                        error!(%coordinate, error = %failure, "Coordinate failed");
                        state.record_failure(coordinate, failure.to_record())
                    }
                };

                match outcome {
                    RecordOutcome::Ignored => return,
                    RecordOutcome::Tripped => run_token.cancel(),
                    RecordOutcome::Recorded => {}
                }
                if let Some(callback) = on_progress {
                    callback(&state.progress());
                }
            });

            // Reap finished jobs so their results don't pile up
            while let Some(joined) = jobs.try_join_next() {
                if let Err(e) = joined {
                    warn!(error = %e, "Job task failed");
                }
            }
        }

        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Job task failed");
            }
        }

        let snapshot = state.snapshot();
        let aborted = snapshot.tripped || self.cancel.is_cancelled();
        if snapshot.tripped {
            error!(
                failed = snapshot.failed,
                total = snapshot.total,
                "Failure threshold reached, run stopped"
            );
        } else if aborted {
            warn!(processed = snapshot.processed(), "Run cancelled");
        }

        RunOutcome { snapshot, aborted }
    }
}
