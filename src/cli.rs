//! Command handler functions for the covgate CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use covgate::baseline::{BaselineStore, JsonBaselineFile};
use covgate::verdict::{self, BuildStatus, BuildVerdict, CommentSettings, Outcome};
use covgate::{
    compare_on_branch, Aggregator, CodeCoverageMetrics, CoverageCheckSettings, CoverageReport,
    CoverageVerdict, PathResolver,
};

/// Everything `check` needs, bound from flags by `main`.
pub struct CheckOptions {
    pub reports: Vec<PathBuf>,
    pub changed_files: Vec<String>,
    pub changed_files_from: Option<PathBuf>,
    pub skip_malformed: bool,
    pub baseline: Option<PathBuf>,
    pub parent_commit: Option<String>,
    pub branch: Option<String>,
    pub settings: Option<CoverageCheckSettings>,
    pub build_status: BuildStatus,
    pub comments: CommentSettings,
    pub json: bool,
}

pub struct CheckOutput {
    pub text: String,
    pub passed: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    metrics: &'a CodeCoverageMetrics,
    coverage: BTreeMap<String, String>,
    comparison: &'a CoverageVerdict,
    verdict: &'a BuildVerdict,
}

/// Changed files from `--changed-file` flags plus an optional file listing
/// one path per line.
pub fn load_changed_files(listed: &[String], from: Option<&Path>) -> Result<Vec<String>> {
    let mut changed = listed.to_vec();
    if let Some(path) = from {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read changed files from {}", path.display()))?;
        changed.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    Ok(changed)
}

/// Load coverage check settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<CoverageCheckSettings> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("Invalid coverage settings in {}", path.display()))
}

/// Read and merge report files. Malformed reports abort the run unless
/// `skip_malformed` is set.
pub fn collect_reports(
    paths: &[PathBuf],
    resolver: PathResolver,
    skip_malformed: bool,
) -> Result<CoverageReport> {
    let mut aggregator = Aggregator::new(resolver);
    for path in paths {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path.display().to_string();
        match aggregator.add_report(&name, &content) {
            Ok(_) => {}
            Err(e) if skip_malformed && e.is_malformed_report() => {
                warn!(error = %e, "skipping malformed report");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(aggregator.finish())
}

pub fn cmd_check(opts: &CheckOptions) -> Result<CheckOutput> {
    let changed = load_changed_files(&opts.changed_files, opts.changed_files_from.as_deref())?;
    let report = collect_reports(&opts.reports, PathResolver::new(changed), opts.skip_malformed)?;
    let metrics = report.metrics();

    let parent = match (&opts.baseline, &opts.parent_commit) {
        (Some(path), Some(commit)) => JsonBaselineFile::new(path)
            .parent_coverage(commit)
            .with_context(|| format!("Failed to load baseline from {}", path.display()))?,
        (Some(_), None) => {
            warn!("--baseline given without --parent-commit, ignoring baseline");
            None
        }
        _ => None,
    };

    let comparison = compare_on_branch(
        metrics,
        parent.as_ref(),
        opts.settings.as_ref(),
        opts.branch.as_deref(),
    );
    let verdict = verdict::fold(opts.build_status, Some(&comparison), &opts.comments);
    let passed = verdict.outcome != Outcome::Failure;

    let text = if opts.json {
        let output = JsonOutput {
            metrics,
            coverage: report.harbormaster_coverage(),
            comparison: &comparison,
            verdict: &verdict,
        };
        let mut text = serde_json::to_string_pretty(&output)?;
        text.push('\n');
        text
    } else {
        let mut out = format_metrics(&report);
        if let Some(message) = &verdict.message {
            writeln!(out, "\n{message}").unwrap();
        }
        out
    };

    Ok(CheckOutput { text, passed })
}

/// Per-line coverage strings, one file per line.
pub fn cmd_encode(reports: &[PathBuf], changed_files: &[String], all: bool) -> Result<String> {
    let report = collect_reports(reports, PathResolver::new(changed_files.to_vec()), false)?;
    let encoded = if all {
        covgate::encode::encode_files(report.files())
    } else {
        report.harbormaster_coverage()
    };

    let mut out = String::new();
    for (path, lines) in &encoded {
        writeln!(out, "{path}\t{lines}").unwrap();
    }
    Ok(out)
}

fn format_metrics(report: &CoverageReport) -> String {
    let mut out = String::new();
    if !report.has_coverage() {
        out.push_str("No coverage data found.\n");
        return out;
    }

    let counters = report.counters();
    let rows = [
        ("Packages:", counters.package),
        ("Files:", counters.file),
        ("Classes:", counters.class),
        ("Methods:", counters.method),
        ("Lines:", counters.line),
        ("Conditionals:", counters.conditional),
    ];
    for (label, counter) in rows {
        writeln!(
            out,
            "{:<14}{}/{} ({:.1}%)",
            label,
            counter.covered,
            counter.total(),
            counter.percent()
        )
        .unwrap();
    }
    out
}
