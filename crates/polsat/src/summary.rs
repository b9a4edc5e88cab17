//! Summary log.
//!
//! One `elapsedSeconds,conflictedRecordCount` line per analyzed document
//! with conflicts, appended across runs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analysis::AnalysisReport;
use crate::error::{AnalysisError, Result};

/// Append-only CSV log of per-document timings.
#[derive(Debug, Clone)]
pub struct SummaryLog {
    path: PathBuf,
}

impl SummaryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the report's summary line. Returns false if the document
    /// had no conflicts and nothing was written.
    pub fn append(&self, report: &AnalysisReport) -> Result<bool> {
        let Some(line) = report.summary_line() else {
            return Ok(false);
        };

        let summary_failed = |source| AnalysisError::Summary {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(summary_failed)?;
        writeln!(file, "{line}").map_err(summary_failed)?;
        Ok(true)
    }
}
