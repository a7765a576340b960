//! End-of-run reporting and the recovery file.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use super::state::RunSnapshot;

/// Errors writing report files.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Final figures of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub status_codes: Vec<u16>,
    pub errors: Vec<String>,
    /// The run stopped at the failure threshold or was interrupted
    pub aborted: bool,
    pub recovery_file: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total coordinates processed: {}/{}",
            self.processed, self.total
        )?;
        writeln!(f, "Successful jobs: {}", self.succeeded)?;
        writeln!(f, "Failed jobs: {}", self.failed)?;
        if self.aborted {
            writeln!(f, "ERROR: Process was stopped before all coordinates were processed")?;
        }
        writeln!(f, "Total runtime: {:.2}s", self.elapsed.as_secs_f64())?;

        if !self.status_codes.is_empty() {
            writeln!(f, "Status codes:")?;
            for code in &self.status_codes {
                writeln!(f, "  {}", code)?;
            }
        }
        if !self.errors.is_empty() {
            writeln!(f, "Unique errors:")?;
            for e in &self.errors {
                writeln!(f, "  {}", e)?;
            }
        }
        Ok(())
    }
}

/// Writes the recovery file and the summary log at the end of a run.
#[derive(Debug, Clone)]
pub struct RunReporter {
    recovery_file: PathBuf,
    summary_file: Option<PathBuf>,
}

impl RunReporter {
    pub fn new(recovery_file: impl Into<PathBuf>) -> Self {
        Self {
            recovery_file: recovery_file.into(),
            summary_file: None,
        }
    }

    /// Also appends each run's summary to `path`.
    pub fn with_summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(path.into());
        self
    }

    pub fn recovery_file(&self) -> &Path {
        &self.recovery_file
    }

    /// Builds the summary and persists the failed coordinates.
    ///
    /// The recovery file is overwritten on every call, also when nothing
    /// failed.
    pub fn report(&self, snapshot: &RunSnapshot, aborted: bool) -> Result<RunSummary, ReportError> {
        let summary = RunSummary {
            total: snapshot.total,
            processed: snapshot.processed(),
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            elapsed: snapshot.elapsed,
            status_codes: snapshot.status_codes.clone(),
            errors: snapshot.errors.clone(),
            aborted,
            recovery_file: self.recovery_file.clone(),
        };

        let lines: String = snapshot
            .failed_coordinates
            .iter()
            .map(|c| format!("{}\n", c))
            .collect();
        write_file(&self.recovery_file, lines.as_bytes())?;

        if let Some(path) = &self.summary_file {
            append_summary(path, &summary)?;
        }

        if aborted {
            error!(
                processed = summary.processed,
                failed = summary.failed,
                service_failures = snapshot.service_failures,
                elapsed_secs = summary.elapsed.as_secs_f64(),
                "Run stopped early"
            );
        } else {
            info!(
                processed = summary.processed,
                succeeded = summary.succeeded,
                failed = summary.failed,
                service_failures = snapshot.service_failures,
                elapsed_secs = summary.elapsed.as_secs_f64(),
                "Run finished"
            );
        }

        Ok(summary)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn append_summary(path: &Path, summary: &RunSummary) -> Result<(), ReportError> {
    let to_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    write!(file, "[{}]\n{}\n", stamp, summary).map_err(to_err)
}

/// Removes from `input` every line that exactly matches a line of
/// `recovery`, writing the result to `output`.
///
/// `output` may be the same path as `input`. Returns the number of lines
/// removed.
pub fn subtract_lines(input: &Path, recovery: &Path, output: &Path) -> Result<usize, ReportError> {
    let read = |path: &Path| {
        fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })
    };
    let recovery_text = read(recovery)?;
    let input_text = read(input)?;

    let remove: HashSet<&str> = recovery_text.lines().collect();
    let mut kept = String::with_capacity(input_text.len());
    let mut removed = 0;
    for line in input_text.lines() {
        if remove.contains(line) {
            removed += 1;
        } else {
            kept.push_str(line);
            kept.push('\n');
        }
    }

    write_file(output, kept.as_bytes())?;
    Ok(removed)
}
