//! Folding of a build's terminal status and the coverage verdict into the
//! single outcome reported back for a change.

use std::convert::Infallible;
use std::fmt::Write;

use serde::Serialize;
use tracing::warn;

use crate::compare::CoverageVerdict;

/// Terminal status of the build that produced the coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Unstable,
    Failure,
    Aborted,
    Unknown,
}

impl std::str::FromStr for BuildStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "success" => BuildStatus::Success,
            "unstable" => BuildStatus::Unstable,
            "failure" | "failed" => BuildStatus::Failure,
            "aborted" => BuildStatus::Aborted,
            _ => BuildStatus::Unknown,
        })
    }
}

/// What to report for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Nothing worth reporting.
    Silent,
    Success,
    Failure,
    Unstable,
    Aborted,
}

/// Controls which outcomes produce a message.
#[derive(Debug, Clone, Default)]
pub struct CommentSettings {
    /// Say "Build is green." even when there is nothing else to say.
    pub comment_on_success: bool,
    /// Add links to the build and its console output on failure.
    pub console_link_on_failure: bool,
    pub build_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildVerdict {
    pub outcome: Outcome,
    pub message: Option<String>,
}

/// Combine the build status with the coverage verdict.
///
/// A failed coverage check fails the build unless it was aborted.
pub fn fold(
    status: BuildStatus,
    coverage: Option<&CoverageVerdict>,
    settings: &CommentSettings,
) -> BuildVerdict {
    let coverage_failed = coverage.is_some_and(|c| !c.passed);
    let status = match status {
        BuildStatus::Aborted => BuildStatus::Aborted,
        _ if coverage_failed => BuildStatus::Failure,
        other => other,
    };
    let coverage_message = coverage.map(|c| c.message.as_str()).filter(|m| !m.is_empty());

    match status {
        BuildStatus::Success => match coverage_message {
            Some(msg) => verdict(Outcome::Success, msg.to_string()),
            None if settings.comment_on_success => {
                verdict(Outcome::Success, "Build is green.".to_string())
            }
            None => BuildVerdict {
                outcome: Outcome::Silent,
                message: None,
            },
        },
        BuildStatus::Unstable => verdict(
            Outcome::Unstable,
            with_details("Build is unstable.", coverage_message),
        ),
        BuildStatus::Failure => {
            let mut message = with_details("Build has FAILED.", coverage_message);
            if settings.console_link_on_failure {
                if let Some(url) = settings.build_url.as_deref() {
                    let url = url.trim_end_matches('/');
                    write!(
                        message,
                        "\n\nLink to build: {url}/\nSee console output for more information: {url}/console"
                    )
                    .unwrap();
                }
            }
            verdict(Outcome::Failure, message)
        }
        BuildStatus::Aborted => verdict(Outcome::Aborted, "Build was aborted.".to_string()),
        BuildStatus::Unknown => {
            warn!("unknown build status, not reporting");
            BuildVerdict {
                outcome: Outcome::Silent,
                message: None,
            }
        }
    }
}

fn verdict(outcome: Outcome, message: String) -> BuildVerdict {
    BuildVerdict {
        outcome,
        message: Some(message),
    }
}

fn with_details(headline: &str, details: Option<&str>) -> String {
    match details {
        Some(details) => format!("{headline}\n\n{details}"),
        None => headline.to_string(),
    }
}
