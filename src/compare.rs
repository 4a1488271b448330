//! Comparison of a build's coverage with its baseline ("parent") coverage,
//! and the threshold rules that decide whether the build passes.

use serde::{Deserialize, Serialize};

use crate::model::CodeCoverageMetrics;

/// Coverage gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageCheckSettings {
    pub enabled: bool,
    /// Largest allowed drop in line coverage, as a negative number of
    /// percentage points (-10.0 allows a drop of up to 10 points).
    pub max_allowed_decrease_percent: f64,
    /// Line coverage floor. Only a build below it can fail.
    pub min_coverage_percent: f64,
}

impl CoverageCheckSettings {
    pub fn new(max_allowed_decrease_percent: f64, min_coverage_percent: f64) -> Self {
        Self {
            enabled: true,
            max_allowed_decrease_percent,
            min_coverage_percent,
        }
    }
}

impl Default for CoverageCheckSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_allowed_decrease_percent: -10.0,
            min_coverage_percent: 0.0,
        }
    }
}

/// Outcome of a baseline comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageVerdict {
    pub passed: bool,
    pub message: String,
}

impl CoverageVerdict {
    fn pass(message: String) -> Self {
        Self {
            passed: true,
            message,
        }
    }
}

pub fn compare(
    current: &CodeCoverageMetrics,
    baseline: Option<&CodeCoverageMetrics>,
    settings: Option<&CoverageCheckSettings>,
) -> CoverageVerdict {
    compare_on_branch(current, baseline, settings, None)
}

/// Compare `current` with `baseline`, naming `branch` in the message.
///
/// Without a baseline there is nothing to enforce and the build passes.
/// With checking enabled, the build fails only when coverage dropped by more
/// than the allowed amount *and* ended below the floor.
pub fn compare_on_branch(
    current: &CodeCoverageMetrics,
    baseline: Option<&CodeCoverageMetrics>,
    settings: Option<&CoverageCheckSettings>,
    branch: Option<&str>,
) -> CoverageVerdict {
    if !current.is_valid() {
        return CoverageVerdict::pass("Coverage could not be computed for this build.".to_string());
    }

    let line = current.line_percent();
    let baseline = match baseline {
        Some(b) if b.is_valid() => b,
        _ => {
            return CoverageVerdict::pass(format!(
                "No baseline coverage found to compare against. Line coverage is {line:.3}%."
            ))
        }
    };

    let delta = line - baseline.line_percent();
    let mut message = if delta > 0.0 {
        format!("Coverage increased (+{delta:.3}%) to {line:.3}%")
    } else if delta < 0.0 {
        format!("Coverage decreased ({delta:.3}%) to {line:.3}%")
    } else {
        format!("Coverage remained the same ({line:.3}%)")
    };

    let sha = short_commit(baseline.commit());
    match branch {
        Some(branch) => message.push_str(&format!(" when pulling {branch} into {sha}.")),
        None => message.push_str(&format!(" compared to {sha}.")),
    }

    let Some(settings) = settings.filter(|s| s.enabled) else {
        return CoverageVerdict::pass(message);
    };

    let max_decrease = settings.max_allowed_decrease_percent;
    let min_coverage = settings.min_coverage_percent;
    if delta < max_decrease && line < min_coverage {
        message.push_str(&format!(
            "\nThe coverage decreased by more than the allowed {max_decrease:?}% \
             and is below the minimum of {min_coverage:?}%."
        ));
        return CoverageVerdict {
            passed: false,
            message,
        };
    }

    CoverageVerdict::pass(message)
}

/// First seven characters of a commit identifier.
fn short_commit(commit: Option<&str>) -> String {
    match commit {
        Some(sha) if !sha.is_empty() => sha.chars().take(7).collect(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(line: f64) -> CodeCoverageMetrics {
        CodeCoverageMetrics::new(100.0, 100.0, 100.0, 100.0, line, 100.0, 0, 0)
    }

    fn baseline(line: f64) -> CodeCoverageMetrics {
        metrics(line).with_commit("0123456789abcdef")
    }

    #[test]
    fn test_no_baseline_passes() {
        let settings = CoverageCheckSettings::new(-1.0, 99.0);
        let verdict = compare(&metrics(10.0), None, Some(&settings));
        assert!(verdict.passed);
        assert!(verdict.message.contains("No baseline"), "{}", verdict.message);
    }

    #[test]
    fn test_invalid_baseline_counts_as_missing() {
        let verdict = compare(&metrics(10.0), Some(&CodeCoverageMetrics::invalid()), None);
        assert!(verdict.passed);
        assert!(verdict.message.contains("No baseline"));
    }

    #[test]
    fn test_invalid_current_short_circuits() {
        let settings = CoverageCheckSettings::new(-1.0, 99.0);
        let verdict = compare(
            &CodeCoverageMetrics::invalid(),
            Some(&baseline(90.0)),
            Some(&settings),
        );
        assert!(verdict.passed);
        assert!(verdict.message.contains("could not be computed"));
    }

    #[test]
    fn test_decrease_wording() {
        let verdict = compare(&metrics(50.0), Some(&baseline(60.0)), None);
        assert!(verdict.passed);
        assert!(
            verdict.message.contains("decreased (-10.000%)"),
            "{}",
            verdict.message
        );
        assert!(verdict.message.contains("to 50.000%"));
        assert!(verdict.message.contains("0123456"));
        assert!(!verdict.message.contains("01234567"));
    }

    #[test]
    fn test_increase_wording() {
        let verdict = compare(&metrics(60.0), Some(&baseline(50.0)), None);
        assert!(
            verdict.message.contains("increased (+10.000%)"),
            "{}",
            verdict.message
        );
    }

    #[test]
    fn test_same_wording() {
        let verdict = compare_on_branch(
            &metrics(72.5),
            Some(&baseline(72.5)),
            None,
            Some("feature/login"),
        );
        assert_eq!(
            verdict.message,
            "Coverage remained the same (72.500%) when pulling feature/login into 0123456."
        );
    }

    #[test]
    fn test_disabled_settings_always_pass() {
        let settings = CoverageCheckSettings {
            enabled: false,
            ..CoverageCheckSettings::new(-1.0, 99.0)
        };
        let verdict = compare(&metrics(10.0), Some(&baseline(90.0)), Some(&settings));
        assert!(verdict.passed);
    }

    #[test]
    fn test_threshold_conjunction() {
        let settings = CoverageCheckSettings::new(-10.0, 80.0);
        let base = baseline(90.0);

        // Small drop, above the floor.
        assert!(compare(&metrics(85.0), Some(&base), Some(&settings)).passed);

        // Large drop, below the floor.
        let verdict = compare(&metrics(75.0), Some(&base), Some(&settings));
        assert!(!verdict.passed);
        assert!(verdict.message.contains("-10.0%"), "{}", verdict.message);
        assert!(verdict.message.contains("80.0%"), "{}", verdict.message);

        // Below the floor, but the drop is within the allowance.
        let lenient = CoverageCheckSettings::new(-20.0, 80.0);
        assert!(compare(&metrics(75.0), Some(&base), Some(&lenient)).passed);

        // Large drop that stays above the floor.
        let low_floor = CoverageCheckSettings::new(-10.0, 50.0);
        assert!(compare(&metrics(60.0), Some(&base), Some(&low_floor)).passed);
    }

    #[test]
    fn test_missing_commit() {
        let verdict = compare(&metrics(50.0), Some(&metrics(50.0)), None);
        assert!(verdict.message.ends_with("compared to unknown."));
    }

    #[test]
    fn test_settings_from_json() {
        let settings: CoverageCheckSettings =
            serde_json::from_str(r#"{"enabled": true, "minCoveragePercent": 70.5}"#).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.min_coverage_percent, 70.5);
        assert_eq!(settings.max_allowed_decrease_percent, -10.0);
    }
}
