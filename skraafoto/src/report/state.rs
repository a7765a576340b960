//! Shared counters of a batch run.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::coord::Coordinate;

/// How a failed job contributes to the run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureRecord {
    /// Whether a remote service or processing fault caused the failure,
    /// as opposed to missing data
    pub service_fault: bool,
    /// HTTP status codes seen while the job ran
    pub status_codes: Vec<u16>,
    /// Error messages seen while the job ran
    pub errors: Vec<String>,
}

/// Effect of recording one job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// This failure pushed the rate over the threshold
    Tripped,
    /// The breaker had already tripped; nothing was recorded
    Ignored,
}

/// Counters-only view of a [`RunState`], cheap enough to take after
/// every job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunProgress {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tripped: bool,
}

impl RunProgress {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Share of jobs settled, 0-100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed() as f64 / self.total as f64 * 100.0
        }
    }
}

/// Consistent copy of a [`RunState`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures caused by a service or processing fault
    pub service_failures: usize,
    /// Distinct status codes, ascending
    pub status_codes: Vec<u16>,
    /// Distinct normalised error messages, sorted
    pub errors: Vec<String>,
    /// Failed coordinates in recording order
    pub failed_coordinates: Vec<Coordinate>,
    pub elapsed: Duration,
    pub tripped: bool,
}

impl RunSnapshot {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Share of jobs settled, 0-100.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed() as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: usize,
    failed: usize,
    service_failures: usize,
    status_codes: BTreeSet<u16>,
    errors: BTreeSet<String>,
    failed_coordinates: Vec<Coordinate>,
    tripped: bool,
}

/// Run-wide record shared by every job.
///
/// All mutation happens under one lock, so a reader never sees a failure
/// counted without its coordinate. Once the breaker trips the record is
/// frozen.
#[derive(Debug)]
pub struct RunState {
    total: usize,
    threshold: f64,
    started: Instant,
    counters: Mutex<Counters>,
}

impl RunState {
    /// `threshold` is the failure percentage at which the breaker trips.
    pub fn new(total: usize, threshold: f64) -> Self {
        Self {
            total,
            threshold,
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn record_success(&self) -> RecordOutcome {
        let mut c = self.counters.lock();
        if c.tripped {
            return RecordOutcome::Ignored;
        }
        c.succeeded += 1;
        RecordOutcome::Recorded
    }

    pub fn record_failure(&self, coordinate: Coordinate, failure: FailureRecord) -> RecordOutcome {
        let mut c = self.counters.lock();
        if c.tripped {
            return RecordOutcome::Ignored;
        }

        c.failed += 1;
        c.failed_coordinates.push(coordinate);
        c.status_codes.extend(failure.status_codes);
        c.errors.extend(
            failure
                .errors
                .iter()
                .map(|e| normalize_error(e))
                .filter(|e| !e.is_empty()),
        );

        if failure.service_fault {
            c.service_failures += 1;
        }

        if self.breaker_exceeded(c.failed) {
            c.tripped = true;
            warn!(
                failed = c.failed,
                service_failures = c.service_failures,
                total = self.total,
                threshold = self.threshold,
                "Failure threshold reached"
            );
            return RecordOutcome::Tripped;
        }
        RecordOutcome::Recorded
    }

    fn breaker_exceeded(&self, failures: usize) -> bool {
        self.total > 0 && failures as f64 / self.total as f64 * 100.0 >= self.threshold
    }

    pub fn is_tripped(&self) -> bool {
        self.counters.lock().tripped
    }

    /// Counters without the failure lists.
    pub fn progress(&self) -> RunProgress {
        let c = self.counters.lock();
        RunProgress {
            total: self.total,
            succeeded: c.succeeded,
            failed: c.failed,
            tripped: c.tripped,
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let c = self.counters.lock();
        RunSnapshot {
            total: self.total,
            succeeded: c.succeeded,
            failed: c.failed,
            service_failures: c.service_failures,
            status_codes: c.status_codes.iter().copied().collect(),
            errors: c.errors.iter().cloned().collect(),
            failed_coordinates: c.failed_coordinates.clone(),
            elapsed: self.started.elapsed(),
            tripped: c.tripped,
        }
    }
}

/// Trims and lowercases an error message.
pub fn normalize_error(message: &str) -> String {
    message.trim().to_lowercase()
}
