//! Gitignore-semantics path filtering.
//!
//! Patterns are evaluated in source order against a slash-separated path
//! relative to the walk root; the last matching pattern wins, and negation
//! patterns (`!`) re-include previously ignored paths.

pub mod parse;
pub mod pattern;

use pattern::Pattern;
use std::fs;
use std::io;
use std::path::Path;

/// A compiled set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct Ignorer {
    patterns: Vec<Pattern>,
}

/// Outcome of matching one path, with the deciding pattern's provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchDetail {
    /// True when the path should be ignored.
    pub ignored: bool,
    /// Text of the last matching pattern, if any.
    pub pattern: Option<String>,
    /// True when the last match was a negation.
    pub negated: bool,
    /// 1-based source line of the last matching pattern; 0 when no match.
    pub line: usize,
}

impl Ignorer {
    /// Compile patterns from file contents. Uncompilable lines are skipped.
    pub fn new(input: &str) -> Ignorer {
        Ignorer {
            patterns: parse::parse(input),
        }
    }

    /// Read and compile an ignore file.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Ignorer> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::new(&contents))
    }

    /// True when the path should be ignored. `path` is relative to the walk
    /// root; `is_dir` reflects what the walker discovered.
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        self.match_detail(path, is_dir).ignored
    }

    /// Match with full provenance: which pattern decided, and on which line.
    pub fn match_detail(&self, path: &str, is_dir: bool) -> MatchDetail {
        let mut result = MatchDetail::default();

        for p in &self.patterns {
            if p.matches(path, is_dir) {
                result = MatchDetail {
                    ignored: !p.is_negated(),
                    pattern: Some(p.original().to_string()),
                    negated: p.is_negated(),
                    line: p.line(),
                };
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_from_empty_input() {
        let ign = Ignorer::new("");
        assert!(!ign.matches("anything.txt", false));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".smerkleignore");
        fs::write(&path, "*.log\nbuild/").unwrap();

        let ign = Ignorer::from_file(&path).unwrap();
        assert!(ign.matches("debug.log", false));
        assert!(ign.matches("build", true));
        assert!(!ign.matches("build", false));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(Ignorer::from_file("/nonexistent/.smerkleignore").is_err());
    }

    #[test]
    fn test_basic_matching() {
        let cases: &[(&str, &str, bool, bool)] = &[
            ("*.log", "debug.log", false, true),
            ("*.log", "main.go", false, false),
            ("*.log", "logs/debug.log", false, true),
            ("build/", "build", true, true),
            ("build/", "build", false, false),
            ("*.log\n*.tmp", "debug.log", false, true),
            ("*.log\n*.tmp", "cache.tmp", false, true),
            ("*.log\n*.tmp", "main.go", false, false),
            ("", "anything.txt", false, false),
            ("# comment\n# another", "anything.txt", false, false),
        ];

        for &(patterns, path, is_dir, want) in cases {
            let ign = Ignorer::new(patterns);
            assert_eq!(
                ign.matches(path, is_dir),
                want,
                "patterns {patterns:?} vs {path:?}"
            );
        }
    }

    #[test]
    fn test_negation_last_match_wins() {
        let cases: &[(&str, &str, bool, bool)] = &[
            ("*.log", "debug.log", false, true),
            ("*.log\n!important.log", "important.log", false, false),
            ("*.log\n!important.log", "debug.log", false, true),
            ("*.log\n!important.log\nimportant.log", "important.log", false, true),
            ("!*.log\n*.log", "debug.log", false, true),
            ("build/\n!build/keep/", "build/keep", true, false),
            ("*.txt\n!important*.txt", "important_notes.txt", false, false),
            (
                "**/test/**\n!**/test/fixtures/**",
                "pkg/test/fixtures/data.json",
                false,
                false,
            ),
        ];

        for &(patterns, path, is_dir, want) in cases {
            let ign = Ignorer::new(patterns);
            assert_eq!(
                ign.matches(path, is_dir),
                want,
                "patterns {patterns:?} vs {path:?}"
            );
        }
    }

    #[test]
    fn test_typical_ignore_file() {
        let ign = Ignorer::new(
            "# Build output\nbuild/\ndist/\n\n# Dependencies\nnode_modules/\nvendor/\n\n# Logs\n*.log\n!important.log\n\n# IDE\n.idea/\n.vscode/\n*.swp",
        );

        let checks: &[(&str, bool, bool)] = &[
            ("build", true, true),
            ("src/build", true, true),
            ("node_modules", true, true),
            ("project/node_modules", true, true),
            ("debug.log", false, true),
            ("logs/error.log", false, true),
            ("important.log", false, false),
            (".idea", true, true),
            ("main.go", false, false),
            ("src/main.go", false, false),
            ("file.swp", false, true),
        ];

        for &(path, is_dir, want) in checks {
            assert_eq!(ign.matches(path, is_dir), want, "path {path:?}");
        }
    }

    #[test]
    fn test_doublestar_patterns() {
        let ign = Ignorer::new("**/test/**\n**/node_modules/**\ndocs/**/*.md");

        let checks: &[(&str, bool)] = &[
            ("test/unit.go", true),
            ("src/test/unit.go", true),
            ("src/pkg/test/unit.go", true),
            ("testing/unit.go", false),
            ("node_modules/pkg/index.js", true),
            ("app/node_modules/pkg/index.js", true),
            ("docs/readme.md", true),
            ("docs/api/reference.md", true),
            ("docs/readme.txt", false),
        ];

        for &(path, want) in checks {
            assert_eq!(ign.matches(path, false), want, "path {path:?}");
        }
    }

    #[test]
    fn test_anchored_patterns() {
        let ign = Ignorer::new("/root.txt\n/build/\nsrc/generated/");

        let checks: &[(&str, bool, bool)] = &[
            ("root.txt", false, true),
            ("subdir/root.txt", false, false),
            ("build", true, true),
            ("subdir/build", true, false),
            ("src/generated", true, true),
            ("other/src/generated", true, false),
        ];

        for &(path, is_dir, want) in checks {
            assert_eq!(ign.matches(path, is_dir), want, "path {path:?}");
        }
    }

    #[test]
    fn test_match_detail_provenance() {
        let ign = Ignorer::new("*.log\n!important.log\nbuild/");

        let d = ign.match_detail("debug.log", false);
        assert!(d.ignored && !d.negated);
        assert_eq!(d.line, 1);
        assert_eq!(d.pattern.as_deref(), Some("*.log"));

        let d = ign.match_detail("important.log", false);
        assert!(!d.ignored && d.negated);
        assert_eq!(d.line, 2);

        let d = ign.match_detail("build", true);
        assert!(d.ignored);
        assert_eq!(d.line, 3);

        let d = ign.match_detail("main.go", false);
        assert!(!d.ignored && !d.negated);
        assert_eq!(d.line, 0);
        assert!(d.pattern.is_none());
    }
}
