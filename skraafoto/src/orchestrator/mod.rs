//! Coordinate job orchestration
//!
//! Admits coordinate jobs under a concurrency limit, fans each job out over
//! the viewing directions and feeds outcomes into the run-wide breaker.
//!
//! ```text
//! Pending → ElevationLookup ─┬─ InvalidElevation ───────────────┐
//!                            └─ SearchFetchFanOut ─┬─ AllSettled ├─→ Reported
//!                                                  └─ EarlyCancelled
//! ```

mod controller;
mod job;
mod types;

pub use controller::{ConcurrencyController, ControllerSettings};
pub use types::{
    CropSource, DirectionOutcome, ElevationSource, ImageSearch, JobFailure, ProgressCallback,
    RunOutcome,
};
