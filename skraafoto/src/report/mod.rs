//! Run bookkeeping.
//!
//! [`RunState`] is the single shared record of a batch run and hosts the
//! failure-rate breaker. [`RunReporter`] turns its final snapshot into a
//! summary and writes the recovery file that can be fed back as input.

mod reporter;
mod state;

pub use reporter::{subtract_lines, ReportError, RunReporter, RunSummary};
pub use state::{normalize_error, FailureRecord, RecordOutcome, RunProgress, RunSnapshot, RunState};
