//! Analyze command - find and resolve policy conflicts.

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use polsat::{
    AnalysisReport, Analyzer, BatchReport, BatchRunner, FileOutcome, GroupReport,
    IdentityRegistry, SummaryLog, Verdict,
};
use polsat_config::{OutputFormat, PolsatConfig};

use crate::style::colors::SemanticStyle;
use crate::style::{
    create_progress, finish_and_clear, print_data_table, print_error, print_hint,
    print_info_table, print_spacer, print_warn,
};

pub fn run(
    config: &PolsatConfig,
    path: &Path,
    summary: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let analyzer = Analyzer::default().with_enumeration_limit(config.analysis.enumeration_limit);
    let mut runner = BatchRunner::new(analyzer).with_extension(&config.analysis.file_extension);
    if let Some(summary) = summary {
        runner = runner.with_summary(SummaryLog::new(summary));
    }

    let text = format == OutputFormat::Text;
    let total = if path.is_dir() {
        runner
            .policy_files(path)
            .with_context(|| format!("Failed to list policy documents in {}", path.display()))?
            .len()
    } else {
        1
    };
    let pb = if text {
        create_progress(total as u64)
    } else {
        ProgressBar::hidden()
    };

    let mut registry = IdentityRegistry::new();
    let result = runner.run(path, &mut registry, |outcome| {
        pb.inc(1);
        if text {
            pb.suspend(|| print_outcome(outcome));
        }
    });
    finish_and_clear(&pb);
    let report = result.with_context(|| format!("Analysis of {} aborted", path.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_totals(&report, path, summary, registry.len()),
    }

    Ok(())
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Analyzed(report) => print_analysis(report),
        FileOutcome::Rejected { path, error } => {
            print_error(&format!("{}: {error}", path.display()));
        }
    }
}

fn print_analysis(report: &AnalysisReport) {
    let name = report
        .source
        .as_deref()
        .and_then(Path::file_name)
        .map_or_else(|| "<input>".to_string(), |n| n.to_string_lossy().into_owned());

    if !report.has_conflicts() {
        println!("{} {}", name.code(), "no conflicts".muted());
        return;
    }

    println!(
        "{} {}",
        name.code(),
        format!(
            "{} policies, {} conflict group(s), {:.3}s",
            report.record_count,
            report.groups.len(),
            report.elapsed_secs
        )
        .muted()
    );
    for group in &report.groups {
        print_group(group);
    }
    print_spacer();
}

fn print_group(group: &GroupReport) {
    let heading = format!("  {} x{}", group.key, group.record_count);
    match &group.verdict {
        Verdict::Resolvable { resolutions } => {
            println!("{heading}: {}", "resolvable".success());
            let rows: Vec<Vec<String>> = resolutions
                .iter()
                .map(|r| vec![r.variable.clone(), r.role.to_string(), r.values.to_string()])
                .collect();
            print_data_table(&["Variable", "Role", "Satisfiable values"], &rows);
        }
        Verdict::Unresolvable => {
            println!("{heading}: {}", "no resolvable assignment".warning());
        }
        Verdict::Failed { error } => {
            println!("{heading}: {} {}", "failed".error(), error.muted());
        }
    }
}

fn print_totals(report: &BatchReport, path: &Path, summary: Option<&Path>, identities: usize) {
    if report.files.is_empty() {
        print_warn(&format!("No policy documents found in {}", path.display()));
        print_hint("Generate some with: polsat generate");
        return;
    }

    let groups: usize = report.analyzed().map(|r| r.groups.len()).sum();
    let count = |f: fn(&Verdict) -> bool| report.analyzed().map(|r| r.count(f)).sum::<usize>();
    let conflicted: usize = report.analyzed().map(|r| r.conflicted_records).sum();

    let mut entries = vec![
        ("Documents", report.files.len().to_string()),
        ("Rejected", report.rejected_count().to_string()),
        ("Identities", identities.to_string()),
        ("Conflict groups", groups.to_string()),
        ("Resolvable", count(Verdict::is_resolvable).to_string()),
        (
            "Unresolvable",
            count(|v| matches!(v, Verdict::Unresolvable)).to_string(),
        ),
        (
            "Failed",
            count(|v| matches!(v, Verdict::Failed { .. })).to_string(),
        ),
        ("Conflicted policies", conflicted.to_string()),
        ("Elapsed", format!("{:.3}s", report.elapsed_secs)),
    ];
    if let Some(summary) = summary {
        entries.push((
            "Summary log",
            format!("{} (+{} lines)", summary.display(), report.summary_lines),
        ));
    }
    print_info_table(&entries);
}
