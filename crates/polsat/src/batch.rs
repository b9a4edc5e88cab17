//! Batch runs over policy documents.
//!
//! A run takes a directory (or a single document), analyzes every policy
//! document in sequence order and appends one summary line per document
//! with conflicts. Documents are ordered by the number formed by all the
//! digits of their file name, so `outputPolicy9.xml` runs before
//! `outputPolicy10.xml`. Names without digits run last, by name.
//!
//! One identity registry serves the whole run. A document that cannot be
//! read or parsed is rejected and the run moves on; exhausting the
//! identity domain or failing to write the summary log stops it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use polsat_document::extract_file;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analysis::{AnalysisReport, Analyzer};
use crate::error::{AnalysisError, Result};
use crate::identity::IdentityRegistry;
use crate::solver::{IntervalSolver, SolverFactory};
use crate::summary::SummaryLog;

/// Default extension of policy documents.
pub const DEFAULT_EXTENSION: &str = "xml";

/// What happened to one document of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Analyzed(AnalysisReport),
    Rejected { path: PathBuf, error: String },
}

impl FileOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Analyzed(report) => report.source.as_deref(),
            Self::Rejected { path, .. } => Some(path),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    /// Documents that produced a summary line.
    pub summary_lines: usize,
    pub elapsed_secs: f64,
}

impl BatchReport {
    pub fn analyzed(&self) -> impl Iterator<Item = &AnalysisReport> {
        self.files.iter().filter_map(|f| match f {
            FileOutcome::Analyzed(report) => Some(report),
            FileOutcome::Rejected { .. } => None,
        })
    }

    pub fn rejected_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Rejected { .. }))
            .count()
    }
}

/// Runs an [`Analyzer`] over policy documents.
#[derive(Debug)]
pub struct BatchRunner<F> {
    analyzer: Analyzer<F>,
    extension: String,
    summary: Option<SummaryLog>,
}

impl Default for BatchRunner<fn() -> IntervalSolver> {
    fn default() -> Self {
        Self::new(Analyzer::default())
    }
}

impl<F: SolverFactory> BatchRunner<F> {
    pub fn new(analyzer: Analyzer<F>) -> Self {
        Self {
            analyzer,
            extension: DEFAULT_EXTENSION.to_string(),
            summary: None,
        }
    }

    /// Only files with this extension (case-insensitive) are analyzed.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Appends summary lines to `log`.
    pub fn with_summary(mut self, log: SummaryLog) -> Self {
        self.summary = Some(log);
        self
    }

    pub fn analyzer(&self) -> &Analyzer<F> {
        &self.analyzer
    }

    /// Lists the documents of `dir` in run order.
    pub fn policy_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let io_failed = |source| AnalysisError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_failed)? {
            let path = entry.map_err(io_failed)?.path();
            let matches = path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
            if matches {
                files.push(path);
            }
        }

        files.sort_by_cached_key(|path| {
            let seq = sequence_number(path);
            (seq.is_none(), seq, path.file_name().map(ToOwned::to_owned))
        });
        Ok(files)
    }

    /// Reads, resolves and analyzes one document.
    pub fn analyze_file(&self, path: &Path, registry: &mut IdentityRegistry) -> Result<AnalysisReport> {
        let entries = extract_file(path).map_err(|source| AnalysisError::DocumentParse {
            path: path.to_path_buf(),
            source,
        })?;
        let records = registry.resolve_entries(entries)?;
        Ok(self.analyzer.analyze(records, registry).with_source(path))
    }

    /// Runs over `path`, a directory of documents or a single document.
    ///
    /// `on_file` sees every outcome as soon as it is known.
    pub fn run(
        &self,
        path: &Path,
        registry: &mut IdentityRegistry,
        mut on_file: impl FnMut(&FileOutcome),
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let files = if path.is_dir() {
            self.policy_files(path)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(AnalysisError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        };
        info!(path = %path.display(), files = files.len(), "Starting policy analysis run");

        let mut report = BatchReport::default();
        for file in files {
            let outcome = match self.analyze_file(&file, registry) {
                Ok(analysis) => {
                    if let Some(log) = &self.summary {
                        if log.append(&analysis)? {
                            report.summary_lines += 1;
                        }
                    }
                    info!(
                        file = %file.display(),
                        conflicts = analysis.groups.len(),
                        conflicted_records = analysis.conflicted_records,
                        elapsed_secs = analysis.elapsed_secs,
                        "Analyzed policy document"
                    );
                    FileOutcome::Analyzed(analysis)
                }
                Err(e) if e.is_fatal() => {
                    error!(file = %file.display(), error = %e, "Aborting analysis run");
                    return Err(e);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Rejected policy document");
                    FileOutcome::Rejected {
                        path: file,
                        error: e.to_string(),
                    }
                }
            };
            on_file(&outcome);
            report.files.push(outcome);
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            files = report.files.len(),
            rejected = report.rejected_count(),
            summary_lines = report.summary_lines,
            elapsed_secs = report.elapsed_secs,
            "Policy analysis run complete"
        );
        Ok(report)
    }
}

/// The number formed by every ASCII digit of the file name, in order.
///
/// `None` if the name has no digits or the number does not fit a `u64`.
pub fn sequence_number(path: &Path) -> Option<u64> {
    let digits: String = path
        .file_name()?
        .to_str()?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const CONFLICT: &str = r#"<policyFile>
  <policy>
    <rule min="0" max="10">comparator</rule>
    <attributes><type>temperature</type><vendor>Google</vendor><user>alice</user></attributes>
  </policy>
  <policy>
    <rule min="5" max="20">comparator</rule>
    <attributes><type>temperature</type><vendor>Google</vendor><user>alice,bob</user></attributes>
  </policy>
</policyFile>"#;

    const NO_CONFLICT: &str = r#"<policyFile>
  <policy>
    <rule>access</rule>
    <attributes><type>password</type><vendor>Latas</vendor><user>carol</user></attributes>
  </policy>
</policyFile>"#;

    #[test_case("outputPolicy12.xml", Some(12); "trailing number")]
    #[test_case("v2-policy10.xml", Some(210); "all digits concatenated")]
    #[test_case("policies.xml", None; "no digits")]
    fn sequence_numbers(name: &str, expected: Option<u64>) {
        assert_eq!(sequence_number(Path::new(name)), expected);
    }

    #[test]
    fn files_sort_numerically_with_undigited_last() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for name in ["outputPolicy10.xml", "b.xml", "outputPolicy9.xml", "a.XML", "notes.txt"] {
            std::fs::write(dir.path().join(name), NO_CONFLICT).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested1.xml")).unwrap();

        let files = BatchRunner::default().policy_files(dir.path()).unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["outputPolicy9.xml", "outputPolicy10.xml", "a.XML", "b.xml"]);
    }

    #[test]
    fn run_writes_one_summary_line_per_conflicted_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("p1.xml"), CONFLICT).unwrap();
        std::fs::write(dir.path().join("p2.xml"), NO_CONFLICT).unwrap();
        std::fs::write(dir.path().join("p3.xml"), CONFLICT).unwrap();
        let summary = dir.path().join("summary.csv");

        let runner = BatchRunner::default().with_summary(SummaryLog::new(&summary));
        let mut registry = IdentityRegistry::new();
        let mut seen = Vec::new();
        let report = runner
            .run(dir.path(), &mut registry, |outcome| {
                seen.push(outcome.path().map(Path::to_path_buf));
            })
            .unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(seen.len(), 3);
        assert_eq!(report.summary_lines, 2);
        let lines = std::fs::read_to_string(&summary).unwrap();
        assert_eq!(lines.lines().count(), 2);
        assert!(lines.lines().all(|l| l.ends_with(",2")));

        // Names keep their ids across documents
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("alice").map(u16::from), Some(1));
    }

    #[test]
    fn malformed_document_is_rejected_and_run_continues() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("p1.xml"), "<policyFile><policy>").unwrap();
        std::fs::write(dir.path().join("p2.xml"), CONFLICT).unwrap();

        let report = BatchRunner::default()
            .run(dir.path(), &mut IdentityRegistry::new(), |_| {})
            .unwrap();

        assert_eq!(report.rejected_count(), 1);
        assert!(matches!(&report.files[0], FileOutcome::Rejected { path, .. } if path.ends_with("p1.xml")));
        assert_eq!(report.analyzed().count(), 1);
    }

    #[test]
    fn single_document_run() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("custom.policy");
        std::fs::write(&path, CONFLICT).unwrap();

        let report = BatchRunner::default()
            .run(&path, &mut IdentityRegistry::new(), |_| {})
            .unwrap();
        let analysis = report.analyzed().next().unwrap();
        assert_eq!(analysis.conflicted_records, 2);
        assert_eq!(analysis.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = BatchRunner::default()
            .run(&dir.path().join("nope"), &mut IdentityRegistry::new(), |_| {})
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn custom_extension() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("p1.pol"), CONFLICT).unwrap();
        std::fs::write(dir.path().join("p2.xml"), CONFLICT).unwrap();

        let files = BatchRunner::default()
            .with_extension(".pol")
            .policy_files(dir.path())
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("p1.pol"));
    }
}
