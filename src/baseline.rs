//! Lookup of previously recorded coverage by commit.
//!
//! The store holding baseline coverage lives outside this crate. This module
//! only defines the seam and two local implementations: an in-memory map and
//! a JSON file exported from the store.
use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::model::CodeCoverageMetrics;

/// A source of baseline coverage keyed by commit identifier.
pub trait BaselineStore {
    /// Coverage recorded for `commit`, or `None` when there is none. The
    /// returned metrics are tagged with the commit.
    fn parent_coverage(&self, commit: &str) -> Result<Option<CodeCoverageMetrics>>;
}

impl BaselineStore for HashMap<String, CodeCoverageMetrics> {
    fn parent_coverage(&self, commit: &str) -> Result<Option<CodeCoverageMetrics>> {
        Ok(self
            .get(commit)
            .map(|metrics| metrics.clone().with_commit(commit)))
    }
}

/// Baseline coverage exported to a JSON file.
///
/// The file holds either an object mapping commit identifiers to metrics, or
/// a single metrics document whose `sha` names its commit.
pub struct JsonBaselineFile {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaselineDocument {
    Single(CodeCoverageMetrics),
    Many(HashMap<String, CodeCoverageMetrics>),
}

impl JsonBaselineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BaselineStore for JsonBaselineFile {
    fn parent_coverage(&self, commit: &str) -> Result<Option<CodeCoverageMetrics>> {
        let content = std::fs::read(&self.path)?;
        let document: BaselineDocument = serde_json::from_slice(&content)?;
        let found = match document {
            BaselineDocument::Single(metrics) => {
                let matches = match metrics.commit() {
                    Some(sha) => sha == commit || sha.starts_with(commit),
                    None => true,
                };
                matches.then(|| metrics.with_commit(commit))
            }
            BaselineDocument::Many(map) => map.parent_coverage(commit)?,
        };
        if found.is_none() {
            debug!(commit, path = %self.path.display(), "no baseline coverage for commit");
        }
        Ok(found)
    }
}
