//! Merging of parsed reports into one view of the change's coverage.
//!
//! Hit counts for a line seen in several reports are combined by taking the
//! maximum, so the merge is commutative and feeding the same data twice has
//! no effect. Entity counters are summed across reports; reports that carry
//! the same coverage are only merged once. Line totals are counted from the merged
//! line maps, so overlapping reports count the union of their lines.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::detect::Dialect;
use crate::encode::encode_lines;
use crate::error::Result;
use crate::model::{CodeCoverageMetrics, Counter, Counters, LineHits};
use crate::parsers::{is_valid_line, parse_report, FileHits, ReportCoverage};
use crate::resolve::PathResolver;

/// Accumulates coverage across the reports of one build.
#[derive(Debug, Default)]
pub struct Aggregator {
    resolver: PathResolver,
    files: BTreeMap<String, FileHits>,
    counters: Counters,
    seen: HashSet<blake3::Hash>,
    merged_reports: usize,
}

impl Aggregator {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            ..Default::default()
        }
    }

    /// Parse one report and merge it.
    ///
    /// Returns the dialect it was read as, or `None` when no dialect applies
    /// and the report was skipped. A malformed report leaves the aggregator
    /// untouched; whether to carry on without it is up to the caller.
    pub fn add_report(&mut self, name: &str, content: &[u8]) -> Result<Option<Dialect>> {
        let parsed = parse_report(content, &self.resolver).map_err(|e| e.in_report(name))?;
        match parsed {
            Some(report) => {
                let dialect = report.dialect;
                debug!(
                    report = name,
                    %dialect,
                    files = report.files.len(),
                    "parsed coverage report"
                );
                if !self.merge(report) {
                    info!(report = name, "same coverage already merged, skipping");
                }
                Ok(Some(dialect))
            }
            None => {
                warn!(report = name, "not a supported coverage report, skipping");
                Ok(None)
            }
        }
    }

    /// Merge a report parsed elsewhere, e.g. on another thread.
    ///
    /// Returns `false` when a report with the same coverage was already
    /// merged; it is not counted again.
    pub fn merge(&mut self, report: ReportCoverage) -> bool {
        if !self.seen.insert(report.digest()) {
            return false;
        }

        for (key, lines) in report.files {
            let file = self.files.entry(key).or_default();
            for (line, hits) in lines {
                if !is_valid_line(line) {
                    continue;
                }
                let entry = file.entry(line).or_insert(hits);
                if hits > *entry {
                    *entry = hits;
                }
            }
        }

        // The line tally is recounted from the merged maps in `finish`.
        let mut counters = report.counters;
        counters.line = Counter::default();
        self.counters.add(&counters);
        self.merged_reports += 1;
        true
    }

    /// Densify the merged line maps and compute the final metrics.
    pub fn finish(self) -> CoverageReport {
        let mut counters = self.counters;
        let mut files = BTreeMap::new();
        for (key, hits) in self.files {
            for &h in hits.values() {
                counters.line.record(h > 0);
            }
            files.insert(key, densify(&hits));
        }

        let metrics = if self.merged_reports == 0 {
            CodeCoverageMetrics::invalid()
        } else {
            CodeCoverageMetrics::from_counters(&counters)
        };

        let changed = if self.resolver.is_empty() {
            None
        } else {
            Some(
                files
                    .keys()
                    .filter(|key| self.resolver.is_changed(key))
                    .cloned()
                    .collect(),
            )
        };

        CoverageReport {
            files,
            counters,
            metrics,
            changed,
        }
    }
}

/// Expand sparse hits into a vector indexed from line 1 through the highest
/// recorded line. `merge` only admits lines in `1..=MAX_LINE_NUMBER`, which
/// bounds the allocation.
fn densify(hits: &FileHits) -> LineHits {
    let last = hits.keys().next_back().copied().unwrap_or(0) as usize;
    let mut lines = vec![None; last];
    for (&line, &count) in hits {
        if let Some(slot) = (line as usize).checked_sub(1).and_then(|i| lines.get_mut(i)) {
            *slot = Some(count);
        }
    }
    lines
}

/// The merged coverage of one build.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    files: BTreeMap<String, LineHits>,
    counters: Counters,
    metrics: CodeCoverageMetrics,
    /// Keys of files that are part of the change, when a change was given.
    changed: Option<HashSet<String>>,
}

impl CoverageReport {
    /// Per-file line hits keyed by resolved path.
    pub fn files(&self) -> &BTreeMap<String, LineHits> {
        &self.files
    }

    pub fn file(&self, key: &str) -> Option<&LineHits> {
        self.files.get(key)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn metrics(&self) -> &CodeCoverageMetrics {
        &self.metrics
    }

    /// Whether any report contributed coverage.
    pub fn has_coverage(&self) -> bool {
        self.metrics.is_valid()
    }

    /// Encoded per-line coverage for transport, keyed by resolved path.
    /// When a set of changed files was given, only those files are included.
    pub fn harbormaster_coverage(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .filter(|(key, _)| match &self.changed {
                Some(changed) => changed.contains(*key),
                None => true,
            })
            .map(|(key, lines)| (key.clone(), encode_lines(lines)))
            .collect()
    }
}

/// Parse and merge `reports`, aborting on the first malformed one.
///
/// `reports` yields `(name, content)` pairs; the name only labels errors and
/// log lines. Use [`Aggregator`] directly to skip malformed reports instead.
pub fn aggregate<I, N, B, C, S>(reports: I, changed_files: C) -> Result<CoverageReport>
where
    I: IntoIterator<Item = (N, B)>,
    N: AsRef<str>,
    B: AsRef<[u8]>,
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut aggregator = Aggregator::new(PathResolver::new(changed_files));
    for (name, content) in reports {
        aggregator.add_report(name.as_ref(), content.as_ref())?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &[u8] = br#"<coverage><packages><package name="p"><classes>
        <class name="A" filename="src/A.java"><methods/><lines>
          <line number="2" hits="3"/><line number="5" hits="0"/>
        </lines></class>
    </classes></package></packages></coverage>"#;

    #[test]
    fn test_densify_fills_gaps() {
        let hits: FileHits = [(2, 3), (5, 0)].into_iter().collect();
        assert_eq!(densify(&hits), vec![None, Some(3), None, None, Some(0)]);
        assert!(densify(&FileHits::new()).is_empty());
    }

    #[test]
    fn test_unknown_report_is_skipped() {
        let mut aggregator = Aggregator::default();
        let dialect = aggregator
            .add_report("junit.xml", b"<testsuite name=\"x\"/>")
            .unwrap();
        assert_eq!(dialect, None);
        let report = aggregator.finish();
        assert!(!report.has_coverage());
        assert!(report.files().is_empty());
    }

    #[test]
    fn test_malformed_report_leaves_state_untouched() {
        let mut aggregator = Aggregator::default();
        aggregator.add_report("good.xml", REPORT).unwrap();
        let err = aggregator
            .add_report(
                "bad.xml",
                br#"<coverage><packages><package name="p"><classes>
                    <class name="B" filename="src/B.java"><lines>
                      <line number="1" hits="1"/><line number="2" hits="?"/>
                    </lines></class></classes></package></packages></coverage>"#,
            )
            .unwrap_err();
        assert!(err.is_malformed_report());
        assert!(err.to_string().contains("bad.xml"));

        let report = aggregator.finish();
        assert_eq!(report.files().len(), 1);
        assert!(report.file("src/B.java").is_none());
    }

    #[test]
    fn test_identical_report_merged_once() {
        let mut aggregator = Aggregator::default();
        assert_eq!(
            aggregator.add_report("a.xml", REPORT).unwrap(),
            Some(Dialect::Cobertura)
        );
        assert_eq!(
            aggregator.add_report("a-copy.xml", REPORT).unwrap(),
            Some(Dialect::Cobertura)
        );
        let report = aggregator.finish();
        assert_eq!(report.counters().class, Counter::new(0, 1));
        assert_eq!(report.counters().line, Counter::new(1, 1));
    }

    #[test]
    fn test_hand_built_report_with_line_zero() {
        let mut report = ReportCoverage::new(Dialect::Cobertura);
        report.record_line("a.java", 2, 1);
        report.files.entry("a.java".to_string()).or_default().insert(0, 1);
        report.files.entry("b.java".to_string()).or_default().insert(0, 3);

        let mut aggregator = Aggregator::default();
        assert!(aggregator.merge(report));
        let merged = aggregator.finish();
        assert_eq!(merged.file("a.java").unwrap(), &vec![None, Some(1)]);
        assert!(merged.file("b.java").unwrap().is_empty());
        assert_eq!(merged.counters().line, Counter::new(1, 0));
    }

    #[test]
    fn test_merge_skips_repeated_coverage() {
        let resolver = PathResolver::default();
        let parsed = parse_report(REPORT, &resolver).unwrap().unwrap();

        let mut aggregator = Aggregator::new(resolver);
        assert!(aggregator.merge(parsed.clone()));
        assert!(!aggregator.merge(parsed));
        let report = aggregator.finish();
        assert_eq!(report.counters().class, Counter::new(0, 1));
        assert_eq!(report.counters().package, Counter::new(0, 1));
    }

    #[test]
    fn test_harbormaster_limited_to_changed_files() {
        let other = br#"<coverage><packages><package name="q"><classes>
            <class name="B" filename="lib/B.java"><methods/><lines>
              <line number="1" hits="1"/>
            </lines></class>
        </classes></package></packages></coverage>"#;
        let report = aggregate(
            [("a.xml", REPORT), ("b.xml", &other[..])],
            ["module/src/A.java"],
        )
        .unwrap();

        // Both files take part in the metrics...
        assert_eq!(report.files().len(), 2);
        assert_eq!(report.metrics().lines_tested(), 3);
        // ...but only the changed one is reported per line.
        let encoded = report.harbormaster_coverage();
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded["module/src/A.java"], "NCNNU");
    }

    #[test]
    fn test_no_changed_files_reports_everything() {
        let report = aggregate([("a.xml", REPORT)], Vec::<String>::new()).unwrap();
        let encoded = report.harbormaster_coverage();
        assert_eq!(encoded["src/A.java"], "NCNNU");
    }
}
