//! Restricted glob translation.
//!
//! Supported syntax:
//! - `?` matches exactly one character other than `/`
//! - `*` matches any run of characters other than `/`
//! - `**` (or any longer run of stars) matches any run of characters, including `/`.
//!   When followed by a `/` it may also match zero directory levels, so `a/**/b`
//!   matches `a/b`.
//!
//! Everything else is matched literally. Matching is always anchored.

use regex::Regex;

/// Normalizes a path or pattern: backslashes become `/`, empty and `.`
/// components are dropped and `dir/..` pairs are folded.
pub fn normalize(pattern: &str) -> String {
    let unified = pattern.replace('\\', "/");
    if unified.is_empty() {
        return ".".to_string();
    }

    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Translates a glob into an (unanchored) regex group.
pub fn translate(pattern: &str) -> String {
    let normalized = normalize(pattern);
    let mut out = String::from("(?s:");
    let mut stars = 0usize;

    for c in normalized.chars() {
        if c == '*' {
            stars += 1;
            continue;
        }
        match stars {
            0 => {}
            1 => out.push_str("[^/]*"),
            _ if c == '/' => {
                // `**/` may swallow whole directories or nothing at all
                out.push_str("(?:.*/)?");
                stars = 0;
                continue;
            }
            _ => out.push_str(".*"),
        }
        stars = 0;
        push_literal(&mut out, c);
    }

    match stars {
        0 => {}
        1 => out.push_str("[^/]*"),
        _ => out.push_str(".*"),
    }
    out.push(')');
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '?' {
        out.push_str("[^/]");
    } else {
        let mut buf = [0u8; 4];
        out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
    }
}

/// A compiled, anchored glob (or alternation of globs).
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::any([pattern])
    }

    /// Builds a matcher accepting a path when any of `patterns` matches it in full.
    pub fn any<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = patterns
            .into_iter()
            .map(|p| translate(p.as_ref()))
            .collect();
        let regex = Regex::new(&format!(r"\A(?:{})\z", alternatives.join("|")))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        GlobMatcher::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_single_star_stays_in_component() {
        assert!(matches("*.h", "foo.h"));
        assert!(matches("*.h", ".h"));
        assert!(!matches("*.h", "a/foo.h"));
        assert!(!matches("*.h", "foo.hpp"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        assert!(matches("**/foo.h", "foo.h"));
        assert!(matches("**/foo.h", "a/b/foo.h"));
        assert!(!matches("**/foo.h", "a/b/xfoo.h"));
        assert!(matches("a/**", "a/b/c"));
        assert!(matches("src/**.cpp", "src/x/y.cpp"));
    }

    #[test]
    fn test_double_star_matches_zero_levels() {
        assert!(matches("a/**/b", "a/b"));
        assert!(matches("a/**/b", "a/x/b"));
        assert!(matches("a/**/b", "a/x/y/b"));
        assert!(!matches("a/**/b", "a/xb"));
    }

    #[test]
    fn test_long_star_runs_behave_like_double_star() {
        assert!(matches("a/***/b", "a/b"));
        assert!(matches("a/****", "a/b/c/d"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("fo?.c", "foo.c"));
        assert!(!matches("fo?.c", "fo/.c"));
        assert!(!matches("fo?.c", "fo.c"));
    }

    #[test]
    fn test_literals_are_escaped() {
        assert!(matches("a+b(1).c", "a+b(1).c"));
        assert!(!matches("a.c", "abc"));
        assert!(matches("x[0]", "x[0]"));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(!matches("foo", "foobar"));
        assert!(!matches("foo", "afoo"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a//b/./c/"), "a/b/c");
        assert_eq!(normalize(r"a\b\c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("/root/../x"), "/x");
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("./"), ".");
        assert_eq!(normalize(""), ".");
    }

    #[test]
    fn test_any_combines_patterns() {
        let m = GlobMatcher::any(["*.c", "include/**"]).unwrap();
        assert!(m.is_match("main.c"));
        assert!(m.is_match("include/a/b.h"));
        assert!(!m.is_match("src/main.c"));
    }
}
