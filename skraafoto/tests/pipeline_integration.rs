//! Integration tests for the coordinate pipeline.
//!
//! These tests drive the `ConcurrencyController` end to end with scripted
//! elevation and catalogue services and an in-memory raster store:
//! - two-coordinate scenario with full and missing coverage
//! - byte-identical crops across runs
//! - invalid elevation short-circuits the job
//! - failure-rate breaker and recovery file contents
//! - missing-data failures count toward the breaker
//! - sibling directions cancelled on the first hard error
//! - a direction whose pixel falls off the raster is skipped
//!
//! Run with: `cargo test --test pipeline_integration`

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tiff::encoder::{colortype, TiffEncoder};
use tokio_util::sync::CancellationToken;

use skraafoto::coord::{Coordinate, Direction};
use skraafoto::orchestrator::{
    ConcurrencyController, ControllerSettings, ElevationSource, ImageSearch, RunOutcome,
};
use skraafoto::projection::CameraModel;
use skraafoto::provider::{
    ElevationError, ElevationSample, HttpError, ImageItem, SearchError, SearchResult,
};
use skraafoto::report::{RunProgress, RunReporter};
use skraafoto::retry::{RetryError, RetryPolicy};
use skraafoto::summary::{SummaryComposer, SUMMARY_FILE_NAME};
use skraafoto::tile::{MemoryRasterOpener, TileFetcher};

// ============================================================================
// Fixtures
// ============================================================================

const COVERED: Coordinate = Coordinate::new(728368.05, 6174304.56);
const UNCOVERED: Coordinate = Coordinate::new(700169.47, 6211841.32);

const RASTER_URL: &str = "https://cdn.test/image.tif";
const RASTER_WIDTH: u32 = 1000;
const RASTER_HEIGHT: u32 = 800;
const CROP_SIZES: [u32; 2] = [64, 128];

/// Uncompressed RGB TIFF with a deterministic pattern.
fn raster_fixture(width: u32, height: u32) -> Vec<u8> {
    let data: Vec<u8> = (0..width * height)
        .flat_map(|i| {
            let (x, y) = (i % width, i / width);
            [(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8]
        })
        .collect();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder
            .write_image::<colortype::RGB8>(width, height, &data)
            .unwrap();
    }
    buf.into_inner()
}

/// Vertical camera 1500 m above `COVERED`.
fn camera() -> CameraModel {
    camera_at(COVERED.easting, COVERED.northing)
}

/// Vertical camera 1500 m above `(easting, northing)`.
fn camera_at(easting: f64, northing: f64) -> CameraModel {
    CameraModel {
        perspective_center: [easting, northing, 1500.0],
        omega: 0.0,
        phi: 0.0,
        kappa: 0.0,
        principal_point_offset: [0.0, 0.0],
        focal_length: 100.0,
        pixel_spacing: 0.005,
        columns: RASTER_WIDTH,
        rows: RASTER_HEIGHT,
    }
}

fn fetcher() -> TileFetcher<MemoryRasterOpener> {
    let mut opener = MemoryRasterOpener::new();
    opener.insert(RASTER_URL, raster_fixture(RASTER_WIDTH, RASTER_HEIGHT));
    TileFetcher::new(
        Arc::new(opener),
        CROP_SIZES.to_vec(),
        85,
        RetryPolicy::doubling(3, Duration::ZERO),
    )
}

fn settings(cache_root: &Path, threshold: f64, max_concurrent: usize) -> ControllerSettings {
    let mut settings = ControllerSettings::new(cache_root);
    settings.threshold = threshold;
    settings.max_concurrent = max_concurrent;
    settings
}

fn crop_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("cropped_"))
        .collect();
    names.sort();
    names
}

// ============================================================================
// Scripted services
// ============================================================================

/// Elevation service answering the same value for every coordinate.
struct FixedElevation {
    kote: Option<f64>,
    calls: AtomicUsize,
}

impl FixedElevation {
    fn new(kote: Option<f64>) -> Self {
        Self {
            kote,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ElevationSource for FixedElevation {
    async fn elevation(
        &self,
        coordinate: Coordinate,
        _cancel: &CancellationToken,
    ) -> Result<ElevationSample, RetryError<ElevationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ElevationSample {
            coordinate,
            kote: self.kote,
        })
    }
}

enum Catalogue {
    /// Finds an image in every direction for the listed coordinates only
    Covers(Vec<Coordinate>),
    /// Every search fails with a 503
    Unavailable,
    /// North fails at once; the other directions wait to be cancelled
    NorthFails,
    /// Covers `COVERED`, but the north image was taken 10 km away
    NorthOffRaster,
}

struct ScriptedSearch {
    catalogue: Catalogue,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

impl ScriptedSearch {
    fn new(catalogue: Catalogue) -> Self {
        Self {
            catalogue,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }
}

fn unavailable() -> RetryError<SearchError> {
    RetryError::Exhausted {
        attempts: 3,
        errors: (0..3)
            .map(|_| SearchError::Http(HttpError::Status { status: 503 }))
            .collect(),
    }
}

impl ImageSearch for ScriptedSearch {
    async fn search(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        _collection: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, RetryError<SearchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.catalogue {
            Catalogue::Covers(covered) if covered.contains(&coordinate) => {
                Ok(SearchResult::Found(ImageItem {
                    id: format!("img_{}", direction),
                    direction,
                    camera: camera(),
                    asset_url: RASTER_URL.to_string(),
                }))
            }
            Catalogue::Covers(_) => Ok(SearchResult::NoCoverage),
            Catalogue::NorthOffRaster => {
                let camera = if direction == Direction::North {
                    camera_at(COVERED.easting + 10_000.0, COVERED.northing)
                } else {
                    camera()
                };
                Ok(SearchResult::Found(ImageItem {
                    id: format!("img_{}", direction),
                    direction,
                    camera,
                    asset_url: RASTER_URL.to_string(),
                }))
            }
            Catalogue::Unavailable => Err(unavailable()),
            Catalogue::NorthFails if direction == Direction::North => Err(unavailable()),
            Catalogue::NorthFails => {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::Cancelled { errors: vec![] })
            }
        }
    }
}

async fn run_scenario(cache_root: &Path) -> RunOutcome {
    let elevation = Arc::new(FixedElevation::new(Some(10.0)));
    let search = Arc::new(ScriptedSearch::new(Catalogue::Covers(vec![COVERED])));
    let controller = ConcurrencyController::new(
        elevation,
        search,
        fetcher(),
        SummaryComposer::new(true, 32),
        settings(cache_root, 75.0, 4),
    );
    controller.run(&[COVERED, UNCOVERED], "skraafotos2023").await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scenario_covered_and_uncovered() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");

    let outcome = run_scenario(&cache).await;

    assert!(!outcome.aborted);
    assert_eq!(outcome.snapshot.succeeded, 1);
    assert_eq!(outcome.snapshot.failed, 1);

    let covered_dir = COVERED.cache_dir(&cache);
    let crops = crop_files(&covered_dir);
    assert_eq!(crops.len(), 5 * CROP_SIZES.len());
    assert!(crops.contains(&"cropped_nadir_box_2.jpg".to_string()));
    assert!(covered_dir.join(SUMMARY_FILE_NAME).exists());
    assert!(!UNCOVERED.cache_dir(&cache).exists());

    let recovery = dir.path().join("failed_coordinates.txt");
    RunReporter::new(&recovery)
        .report(&outcome.snapshot, outcome.aborted)
        .unwrap();
    assert_eq!(
        fs::read_to_string(&recovery).unwrap(),
        "700169.47 6211841.32\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crop_centred_on_projected_pixel() {
    let dir = tempfile::tempdir().unwrap();
    run_scenario(dir.path()).await;

    let img = image::open(COVERED.cache_dir(dir.path()).join("cropped_north_box_1.jpg")).unwrap();
    assert_eq!((img.width(), img.height()), (64, 64));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reruns_are_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    run_scenario(first.path()).await;
    run_scenario(second.path()).await;

    let a = COVERED.cache_dir(first.path());
    let b = COVERED.cache_dir(second.path());
    let names = crop_files(&a);
    assert_eq!(names, crop_files(&b));
    for name in names {
        assert_eq!(
            fs::read(a.join(&name)).unwrap(),
            fs::read(b.join(&name)).unwrap(),
            "{} differs between runs",
            name
        );
    }
}

#[tokio::test]
async fn test_invalid_elevation_skips_search() {
    for kote in [None, Some(-9999.0), Some(0.0)] {
        let dir = tempfile::tempdir().unwrap();
        let elevation = Arc::new(FixedElevation::new(kote));
        let search = Arc::new(ScriptedSearch::new(Catalogue::Covers(vec![COVERED])));
        let controller = ConcurrencyController::new(
            Arc::clone(&elevation),
            Arc::clone(&search),
            fetcher(),
            SummaryComposer::new(false, 32),
            settings(dir.path(), 101.0, 2),
        );

        let outcome = controller.run(&[COVERED], "skraafotos2023").await;

        assert_eq!(elevation.calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0, "kote {:?}", kote);
        assert_eq!(outcome.snapshot.failed, 1);
        assert_eq!(outcome.snapshot.service_failures, 0);
        assert!(!outcome.aborted);
        assert_eq!(
            outcome.snapshot.errors,
            vec!["elevation data is missing or invalid".to_string()]
        );
    }
}

#[tokio::test]
async fn test_breaker_stops_run_and_records_exact_failures() {
    let dir = tempfile::tempdir().unwrap();
    let elevation = Arc::new(FixedElevation::new(Some(10.0)));
    let search = Arc::new(ScriptedSearch::new(Catalogue::Unavailable));
    let controller = ConcurrencyController::new(
        Arc::clone(&elevation),
        search,
        fetcher(),
        SummaryComposer::new(false, 32),
        settings(dir.path(), 50.0, 1),
    );
    let coords = [
        Coordinate::new(1.0, 1.0),
        Coordinate::new(2.0, 2.0),
        Coordinate::new(3.0, 3.0),
        Coordinate::new(4.0, 4.0),
    ];

    let outcome = controller.run(&coords, "skraafotos2023").await;

    assert!(outcome.aborted);
    assert!(outcome.breaker_tripped());
    assert_eq!(outcome.snapshot.failed, 2);
    assert_eq!(elevation.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.snapshot.status_codes, vec![503]);

    let recovery = dir.path().join("failed.txt");
    RunReporter::new(&recovery)
        .report(&outcome.snapshot, outcome.aborted)
        .unwrap();
    assert_eq!(fs::read_to_string(&recovery).unwrap(), "1 1\n2 2\n");
}

#[tokio::test]
async fn test_missing_data_failures_trip_breaker() {
    let coords = [
        Coordinate::new(1.0, 1.0),
        Coordinate::new(2.0, 2.0),
        Coordinate::new(3.0, 3.0),
        Coordinate::new(4.0, 4.0),
    ];

    // No imagery anywhere, then no elevation anywhere
    let cases = [(Some(10.0), Catalogue::Covers(vec![])), (None, Catalogue::Covers(vec![]))];
    for (kote, catalogue) in cases {
        let dir = tempfile::tempdir().unwrap();
        let elevation = Arc::new(FixedElevation::new(kote));
        let controller = ConcurrencyController::new(
            Arc::clone(&elevation),
            Arc::new(ScriptedSearch::new(catalogue)),
            fetcher(),
            SummaryComposer::new(false, 32),
            settings(dir.path(), 50.0, 1),
        );

        let outcome = controller.run(&coords, "skraafotos2023").await;

        assert!(outcome.aborted, "kote {:?}", kote);
        assert!(outcome.breaker_tripped());
        assert_eq!(outcome.snapshot.failed, 2);
        assert_eq!(outcome.snapshot.service_failures, 0);
        assert_eq!(elevation.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            outcome.snapshot.failed_coordinates,
            vec![Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)]
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_off_raster_direction_keeps_other_directions() {
    let dir = tempfile::tempdir().unwrap();
    let search = Arc::new(ScriptedSearch::new(Catalogue::NorthOffRaster));
    let controller = ConcurrencyController::new(
        Arc::new(FixedElevation::new(Some(10.0))),
        Arc::clone(&search),
        fetcher(),
        SummaryComposer::new(false, 32),
        settings(dir.path(), 50.0, 1),
    );

    let outcome = controller.run(&[COVERED], "skraafotos2023").await;

    assert!(!outcome.aborted);
    assert_eq!(outcome.snapshot.succeeded, 1);
    assert_eq!(outcome.snapshot.failed, 0);
    assert_eq!(search.calls.load(Ordering::SeqCst), 5);

    let crops = crop_files(&COVERED.cache_dir(dir.path()));
    assert_eq!(crops.len(), 4 * CROP_SIZES.len());
    assert!(crops.iter().all(|name| !name.starts_with("cropped_north_")));
}

#[tokio::test]
async fn test_first_hard_error_cancels_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let search = Arc::new(ScriptedSearch::new(Catalogue::NorthFails));
    let controller = ConcurrencyController::new(
        Arc::new(FixedElevation::new(Some(10.0))),
        Arc::clone(&search),
        fetcher(),
        SummaryComposer::new(false, 32),
        settings(dir.path(), 100.0, 1),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        controller.run(&[COVERED], "skraafotos2023"),
    )
    .await
    .expect("siblings were not cancelled");

    assert_eq!(outcome.snapshot.failed, 1);
    assert_eq!(search.cancelled.load(Ordering::SeqCst), 4);
    assert_eq!(outcome.snapshot.status_codes, vec![503]);
}

#[tokio::test]
async fn test_progress_reported_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let controller = ConcurrencyController::new(
        Arc::new(FixedElevation::new(None)),
        Arc::new(ScriptedSearch::new(Catalogue::Covers(vec![]))),
        fetcher(),
        SummaryComposer::new(false, 32),
        settings(dir.path(), 101.0, 2),
    )
    .with_progress(Arc::new(move |counters: &RunProgress| {
        sink.lock().push(counters.percent())
    }));

    controller
        .run(&[COVERED, UNCOVERED], "skraafotos2023")
        .await;

    let mut seen = seen.lock().clone();
    seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(seen, vec![50.0, 100.0]);
}

#[tokio::test]
async fn test_external_cancellation_admits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let elevation = Arc::new(FixedElevation::new(Some(10.0)));
    let token = CancellationToken::new();
    token.cancel();

    let controller = ConcurrencyController::new(
        Arc::clone(&elevation),
        Arc::new(ScriptedSearch::new(Catalogue::Covers(vec![COVERED]))),
        fetcher(),
        SummaryComposer::new(false, 32),
        settings(dir.path(), 50.0, 2),
    )
    .with_cancellation(token);

    let outcome = controller.run(&[COVERED], "skraafotos2023").await;

    assert!(outcome.aborted);
    assert!(!outcome.breaker_tripped());
    assert_eq!(outcome.snapshot.processed(), 0);
    assert_eq!(elevation.calls.load(Ordering::SeqCst), 0);
}
