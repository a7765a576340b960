//! Skraafoto - cropped oblique aerial imagery around ground coordinates
//!
//! This library turns a batch of EPSG:25832 ground coordinates into cached
//! image crops: terrain elevation lookup, catalogue search per viewing
//! direction, photogrammetric projection into the matched image and a
//! windowed read of the remote Cloud Optimized GeoTIFF.
//!
//! # Architecture
//!
//! ```text
//! ConcurrencyController (orchestrator)
//!         │
//!         ├── ElevationClient      (provider::elevation)
//!         ├── ImageSearchClient    (provider::search)
//!         ├── project()            (projection)
//!         ├── TileFetcher          (tile, raster)
//!         ├── SummaryComposer      (summary)
//!         │
//!         └── RunState ──► RunReporter (report)
//! ```

pub mod app;
pub mod config;
pub mod coord;
pub mod logging;
pub mod orchestrator;
pub mod projection;
pub mod provider;
pub mod raster;
pub mod report;
pub mod retry;
pub mod summary;
pub mod tile;

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
