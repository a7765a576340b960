//! Orchestrator seams, failures and outcomes

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::coord::{Coordinate, Direction};
use crate::provider::{
    ElevationClient, ElevationError, ElevationSample, HttpClient, ImageSearchClient, SearchError,
    SearchResult,
};
use crate::report::{FailureRecord, RunProgress, RunSnapshot};
use crate::retry::{RetryError, Retryable};
use crate::tile::{CropRequest, CropResult, FetchError, RasterOpener, TileFetcher};

/// Terrain elevation lookup used by a job.
pub trait ElevationSource: Send + Sync + 'static {
    fn elevation(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ElevationSample, RetryError<ElevationError>>> + Send;
}

/// Catalogue search used by a job.
pub trait ImageSearch: Send + Sync + 'static {
    fn search(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        collection: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<SearchResult, RetryError<SearchError>>> + Send;
}

/// Crop extraction used by a job.
pub trait CropSource: Send + Sync + 'static {
    fn fetch_crops(
        &self,
        request: &CropRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<CropResult>, RetryError<FetchError>>> + Send;
}

impl<T: ElevationSource> ElevationSource for Arc<T> {
    fn elevation(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ElevationSample, RetryError<ElevationError>>> + Send {
        (**self).elevation(coordinate, cancel)
    }
}

impl<T: ImageSearch> ImageSearch for Arc<T> {
    fn search(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        collection: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<SearchResult, RetryError<SearchError>>> + Send {
        (**self).search(coordinate, direction, collection, cancel)
    }
}

impl<T: CropSource> CropSource for Arc<T> {
    fn fetch_crops(
        &self,
        request: &CropRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<CropResult>, RetryError<FetchError>>> + Send {
        (**self).fetch_crops(request, cancel)
    }
}

impl<C: HttpClient + 'static> ElevationSource for ElevationClient<C> {
    async fn elevation(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<ElevationSample, RetryError<ElevationError>> {
        self.get_elevation(coordinate, cancel).await
    }
}

impl<C: HttpClient + 'static> ImageSearch for ImageSearchClient<C> {
    async fn search(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, RetryError<SearchError>> {
        ImageSearchClient::search(self, coordinate, direction, collection, cancel).await
    }
}

impl<O: RasterOpener> CropSource for TileFetcher<O> {
    async fn fetch_crops(
        &self,
        request: &CropRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<CropResult>, RetryError<FetchError>> {
        TileFetcher::fetch_crops(self, request, cancel).await
    }
}

/// Called with the run counters after every recorded job.
pub type ProgressCallback = Arc<dyn Fn(&RunProgress) + Send + Sync>;

/// Why a coordinate job failed.
#[derive(Debug, Error)]
pub enum JobFailure {
    /// The elevation service answered, but without usable data
    #[error("elevation data is missing or invalid")]
    InvalidElevation { kote: Option<f64> },

    #[error("elevation lookup failed: {0}")]
    Elevation(RetryError<ElevationError>),

    #[error("image search ({direction}) failed: {source}")]
    Search {
        direction: Direction,
        source: RetryError<SearchError>,
    },

    #[error("crop fetch ({direction}) failed: {source}")]
    Fetch {
        direction: Direction,
        source: RetryError<FetchError>,
    },

    /// No direction produced a crop
    #[error("no imagery covers this coordinate")]
    NoCoverage,

    #[error("job cancelled")]
    Cancelled,

    #[error("job task failed: {0}")]
    Internal(String),
}

impl JobFailure {
    /// Whether the failure reflects a remote or processing fault rather
    /// than missing data. Both kinds count toward the breaker.
    pub fn is_service_fault(&self) -> bool {
        !matches!(
            self,
            JobFailure::InvalidElevation { .. } | JobFailure::NoCoverage | JobFailure::Cancelled
        )
    }

    /// HTTP status codes seen on every attempt.
    pub fn status_codes(&self) -> Vec<u16> {
        match self {
            JobFailure::Elevation(e) => e.status_codes().collect(),
            JobFailure::Search { source, .. } => source.status_codes().collect(),
            JobFailure::Fetch { source, .. } => source.status_codes().collect(),
            _ => Vec::new(),
        }
    }

    /// Messages of every error seen, oldest first.
    pub fn messages(&self) -> Vec<String> {
        fn all<E: std::fmt::Display>(e: &RetryError<E>) -> Vec<String> {
            e.errors().iter().map(ToString::to_string).collect()
        }
        let messages = match self {
            JobFailure::Elevation(e) => all(e),
            JobFailure::Search { source, .. } => all(source),
            JobFailure::Fetch { source, .. } => all(source),
            _ => Vec::new(),
        };
        if messages.is_empty() {
            vec![self.to_string()]
        } else {
            messages
        }
    }

    pub fn to_record(&self) -> FailureRecord {
        FailureRecord {
            service_fault: self.is_service_fault(),
            status_codes: self.status_codes(),
            errors: self.messages(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self, JobFailure::Cancelled)
    }
}

/// What one direction of a job produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectionOutcome {
    Cropped(Vec<CropResult>),
    NoCoverage,
    /// The image was found but the ground point does not project into it
    Unprojectable,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: RunSnapshot,
    /// The breaker tripped or the run was cancelled
    pub aborted: bool,
}

impl RunOutcome {
    pub fn breaker_tripped(&self) -> bool {
        self.snapshot.tripped
    }
}

/// Maps a retry outcome to a job failure, keeping cancellations apart.
pub(crate) fn job_failure<E: Retryable>(
    error: RetryError<E>,
    wrap: impl FnOnce(RetryError<E>) -> JobFailure,
) -> JobFailure {
    if error.is_cancelled() {
        JobFailure::Cancelled
    } else {
        wrap(error)
    }
}
