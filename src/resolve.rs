//! Mapping from the file paths recorded in a coverage report to the
//! project-relative paths of the files touched by a change.
//!
//! Coverage tools often record absolute or build-environment paths, while the
//! change only knows paths relative to the repository root. Rather than strip
//! tool-specific prefixes, we pick the changed file sharing the longest
//! common suffix with the report path, and accept it only when both name the
//! same file.
//!
//! Two changed files with the same basename in different directories can only
//! be told apart when the report path carries enough of the directory
//! structure. A bare basename matches whichever candidate comes first.

use std::collections::HashSet;

use tracing::debug;

/// Resolves report paths against the set of changed files.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    changed: Vec<String>,
    lookup: HashSet<String>,
}

impl PathResolver {
    /// Build a resolver over `changed_files`, keeping their order. Repeated
    /// entries keep their first position.
    pub fn new<I, S>(changed_files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver = Self::default();
        for path in changed_files {
            let path = path.into();
            if resolver.lookup.insert(path.clone()) {
                resolver.changed.push(path);
            }
        }
        resolver
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Whether `key` is one of the changed files.
    pub fn is_changed(&self, key: &str) -> bool {
        self.lookup.contains(key)
    }

    /// Map `report_path` to a changed file, or return it unchanged when no
    /// changed file names the same file.
    pub fn resolve(&self, report_path: &str) -> String {
        if self.changed.is_empty() {
            return report_path.to_string();
        }

        let mut best: Option<&str> = None;
        let mut best_len = 0;
        for candidate in &self.changed {
            let len = common_suffix_len(candidate, report_path);
            // Strictly greater: ties keep the first-seen candidate.
            if best.is_none() || len > best_len {
                best = Some(candidate);
                best_len = len;
            }
        }

        match best {
            Some(candidate) if file_name(candidate) == file_name(report_path) => {
                candidate.to_string()
            }
            _ => {
                debug!(path = report_path, "no changed file matches report path");
                report_path.to_string()
            }
        }
    }
}

/// Number of trailing characters `a` and `b` have in common.
fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// The final path segment, after the last `/` or `\`.
fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_changed_set_is_identity() {
        let resolver = PathResolver::new(Vec::<String>::new());
        assert!(resolver.is_empty());
        assert_eq!(
            resolver.resolve("/abs/build/src/Foo.java"),
            "/abs/build/src/Foo.java"
        );
    }

    #[test]
    fn test_strips_environment_prefix() {
        let resolver = PathResolver::new(["src/main/java/com/example/Foo.java", "README.md"]);
        assert_eq!(
            resolver.resolve("/home/ci/workspace/src/main/java/com/example/Foo.java"),
            "src/main/java/com/example/Foo.java"
        );
        assert_eq!(
            resolver.resolve("com/example/Foo.java"),
            "src/main/java/com/example/Foo.java"
        );
    }

    #[test]
    fn test_exact_match_beats_same_basename() {
        let resolver = PathResolver::new(["pkg/a/Greet.java", "pkg/b/Greet.java"]);
        assert_eq!(resolver.resolve("pkg/b/Greet.java"), "pkg/b/Greet.java");
        assert_eq!(resolver.resolve("pkg/a/Greet.java"), "pkg/a/Greet.java");
    }

    #[test]
    fn test_bare_basename_takes_first_candidate() {
        let resolver = PathResolver::new(["pkg/a/Greet.java", "pkg/b/Greet.java"]);
        assert_eq!(resolver.resolve("Greet.java"), "pkg/a/Greet.java");
    }

    #[test]
    fn test_partial_filename_suffix_is_rejected() {
        let resolver = PathResolver::new(["x/Greet.java"]);
        // Shares "eet.java" but names a different file.
        assert_eq!(resolver.resolve("y/Sweet.java"), "y/Sweet.java");
        assert_eq!(resolver.resolve("eet.java"), "eet.java");
    }

    #[test]
    fn test_unrelated_path_falls_back() {
        let resolver = PathResolver::new(["src/lib.rs"]);
        assert_eq!(resolver.resolve("other/Main.java"), "other/Main.java");
        assert!(!resolver.is_changed("other/Main.java"));
        assert!(resolver.is_changed("src/lib.rs"));
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let resolver = PathResolver::new(["b/Foo.java", "a/Foo.java", "b/Foo.java"]);
        assert_eq!(resolver.resolve("Foo.java"), "b/Foo.java");
    }

    #[test]
    fn test_windows_separators() {
        let resolver = PathResolver::new(["src\\app\\Main.cs"]);
        assert_eq!(resolver.resolve("C:\\build\\src\\app\\Main.cs"), "src\\app\\Main.cs");
    }

    #[test]
    fn test_common_suffix_len() {
        assert_eq!(common_suffix_len("abc", "xbc"), 2);
        assert_eq!(common_suffix_len("abc", "abc"), 3);
        assert_eq!(common_suffix_len("", "abc"), 0);
    }
}
