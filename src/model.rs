//! Format-independent coverage values: the covered/missed tallies collected
//! while parsing and the percentage snapshot compared against a baseline.

use serde::{Deserialize, Serialize};

/// Dense per-file hit data. Index 0 is line 1; `None` marks a line that is
/// not executable, `Some(0)` an executable line that was never hit.
pub type LineHits = Vec<Option<u64>>;

/// A covered/missed tally for one coverage category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub covered: u64,
    pub missed: u64,
}

impl Counter {
    pub fn new(covered: u64, missed: u64) -> Self {
        Self { covered, missed }
    }

    /// Count one entity as covered or missed.
    pub fn record(&mut self, covered: bool) {
        if covered {
            self.covered += 1;
        } else {
            self.missed += 1;
        }
    }

    pub fn add(&mut self, other: Counter) {
        self.covered += other.covered;
        self.missed += other.missed;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// Percentage covered. An empty counter is vacuously fully covered.
    #[must_use]
    pub fn percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            100.0
        } else {
            self.covered as f64 / total as f64 * 100.0
        }
    }
}

/// The six coverage categories tracked for one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub package: Counter,
    pub file: Counter,
    pub class: Counter,
    pub method: Counter,
    pub line: Counter,
    pub conditional: Counter,
}

impl Counters {
    pub fn add(&mut self, other: &Counters) {
        self.package.add(other.package);
        self.file.add(other.file);
        self.class.add(other.class);
        self.method.add(other.method);
        self.line.add(other.line);
        self.conditional.add(other.conditional);
    }
}

/// Percentage snapshot of one build's coverage, optionally tagged with the
/// commit it was computed for.
///
/// Equality compares the six percentages and the two line counts. The
/// commit tag is metadata and does not take part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCoverageMetrics {
    #[serde(rename = "packageCoverage")]
    package_percent: f64,
    #[serde(rename = "filesCoverage")]
    files_percent: f64,
    #[serde(rename = "classesCoverage")]
    classes_percent: f64,
    #[serde(rename = "methodCoverage")]
    method_percent: f64,
    #[serde(rename = "lineCoverage")]
    line_percent: f64,
    #[serde(rename = "conditionalCoverage")]
    conditional_percent: f64,
    #[serde(default)]
    lines_covered: u64,
    #[serde(default)]
    lines_tested: u64,
    #[serde(rename = "sha", default, skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
}

impl CodeCoverageMetrics {
    /// Line percentage marking metrics that were never computed.
    pub const INVALID_PERCENT: f64 = -1.0;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        package_percent: f64,
        files_percent: f64,
        classes_percent: f64,
        method_percent: f64,
        line_percent: f64,
        conditional_percent: f64,
        lines_covered: u64,
        lines_tested: u64,
    ) -> Self {
        Self {
            package_percent,
            files_percent,
            classes_percent,
            method_percent,
            line_percent,
            conditional_percent,
            lines_covered,
            lines_tested,
            commit: None,
        }
    }

    pub fn from_counters(counters: &Counters) -> Self {
        Self::new(
            counters.package.percent(),
            counters.file.percent(),
            counters.class.percent(),
            counters.method.percent(),
            counters.line.percent(),
            counters.conditional.percent(),
            counters.line.covered,
            counters.line.total(),
        )
    }

    /// Metrics for a build whose coverage could not be computed.
    pub fn invalid() -> Self {
        let p = Self::INVALID_PERCENT;
        Self::new(p, p, p, p, p, p, 0, 0)
    }

    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.line_percent != Self::INVALID_PERCENT
    }

    pub fn package_percent(&self) -> f64 {
        self.package_percent
    }

    pub fn files_percent(&self) -> f64 {
        self.files_percent
    }

    pub fn classes_percent(&self) -> f64 {
        self.classes_percent
    }

    pub fn method_percent(&self) -> f64 {
        self.method_percent
    }

    pub fn line_percent(&self) -> f64 {
        self.line_percent
    }

    pub fn conditional_percent(&self) -> f64 {
        self.conditional_percent
    }

    pub fn lines_covered(&self) -> u64 {
        self.lines_covered
    }

    pub fn lines_tested(&self) -> u64 {
        self.lines_tested
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }
}

impl PartialEq for CodeCoverageMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.package_percent == other.package_percent
            && self.files_percent == other.files_percent
            && self.classes_percent == other.classes_percent
            && self.method_percent == other.method_percent
            && self.line_percent == other.line_percent
            && self.conditional_percent == other.conditional_percent
            && self.lines_covered == other.lines_covered
            && self.lines_tested == other.lines_tested
    }
}

impl std::fmt::Display for CodeCoverageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "packages: {:.3}%, files: {:.3}%, classes: {:.3}%, methods: {:.3}%, \
             lines: {:.3}% ({}/{}), conditionals: {:.3}%",
            self.package_percent,
            self.files_percent,
            self.classes_percent,
            self.method_percent,
            self.line_percent,
            self.lines_covered,
            self.lines_tested,
            self.conditional_percent,
        )
    }
}
