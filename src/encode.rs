//! The per-line coverage string sent to the review server: one character per
//! source line, `N` for lines that are not executable, `U` for executable
//! lines that were never hit and `C` for covered lines.

use std::collections::BTreeMap;

use crate::model::LineHits;

pub const NOT_EXECUTABLE: char = 'N';
pub const UNCOVERED: char = 'U';
pub const COVERED: char = 'C';

#[must_use]
pub fn encode_lines(lines: &[Option<u64>]) -> String {
    lines
        .iter()
        .map(|hits| match hits {
            None => NOT_EXECUTABLE,
            Some(0) => UNCOVERED,
            Some(_) => COVERED,
        })
        .collect()
}

/// Encode every file of a coverage map.
#[must_use]
pub fn encode_files(files: &BTreeMap<String, LineHits>) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|(path, lines)| (path.clone(), encode_lines(lines)))
        .collect()
}
