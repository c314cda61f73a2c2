//! Parsing of gitignore-style pattern lists.
//!
//! Lines are read in order; CR endings and trailing spaces/tabs are
//! stripped, blank lines and `#` comments are dropped, and escape sequences
//! (`\#`, `\!`, `\\`) are resolved. A pattern that fails to compile is
//! skipped; parsing continues with the rest of the file.

use super::pattern::Pattern;
use tracing::debug;

/// Parse pattern lines from a complete file's contents.
pub fn parse(input: &str) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line_number = idx + 1;

        let line = line.strip_suffix('\r').unwrap_or(line);
        let line = line.trim_end_matches([' ', '\t']);

        if line.is_empty() {
            continue;
        }

        // Comments, unless the hash is escaped.
        if line.starts_with('#') {
            continue;
        }

        let line = process_escapes(line);

        match Pattern::compile(&line, line_number) {
            Ok(p) => patterns.push(p),
            Err(e) => {
                debug!(line = line_number, pattern = %line, "skipping ignore pattern: {}", e);
            }
        }
    }

    patterns
}

/// Resolve escape sequences: `\#` → `#` anywhere, `\\` → `\`, `\!` → `!`
/// except at column 0, where `\!` is preserved so compilation knows it is
/// not a negation.
fn process_escapes(line: &str) -> String {
    if !line.contains('\\') {
        return line.to_string();
    }

    let chars: Vec<char> = line.chars().collect();
    let mut result = String::with_capacity(line.len());

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                '#' => {
                    result.push('#');
                    i += 2;
                    continue;
                }
                '!' => {
                    if i == 0 {
                        // Keep the marker for the compiler.
                        result.push('\\');
                    }
                    result.push('!');
                    i += 2;
                    continue;
                }
                '\\' => {
                    result.push('\\');
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_counts() {
        let cases: &[(&str, usize)] = &[
            ("", 0),
            ("*.log", 1),
            ("*.log\n*.tmp\nbuild/", 3),
            ("*.log\n\n\n*.tmp", 2),
            ("# This is a comment\n*.log\n# Another comment", 1),
            ("*.log   \n*.tmp  ", 2),
            ("   \n*.log\n\t\t\n*.tmp", 2),
            ("\\#important.txt", 1),
            ("*.log\n!important.log", 2),
            (
                "# Build artifacts\nbuild/\ndist/\n\n# But keep this\n!build/keep.txt\n\n*.log",
                4,
            ),
            ("*.log\r\n*.tmp\r\n", 2),
        ];

        for &(input, want) in cases {
            let patterns = parse(input);
            assert_eq!(patterns.len(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_line_numbers() {
        let patterns = parse("# comment\n*.log\n\n!important.log");
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].line(), 2);
        assert_eq!(patterns[1].line(), 4);
    }

    #[test]
    fn test_parse_skips_invalid_patterns() {
        let patterns = parse("file[abc.txt\n*.log");
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].original(), "*.log");
    }

    #[test]
    fn test_process_escapes() {
        assert_eq!(process_escapes("no escapes"), "no escapes");
        assert_eq!(process_escapes("\\#tag"), "#tag");
        assert_eq!(process_escapes("\\!literal"), "\\!literal");
        assert_eq!(process_escapes("mid\\!dle"), "mid!dle");
        assert_eq!(process_escapes("back\\\\slash"), "back\\slash");
    }

    #[test]
    fn test_escaped_hash_is_a_pattern() {
        let patterns = parse("\\#important.txt");
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].matches("#important.txt", false));
    }
}
