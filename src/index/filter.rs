//! Include/exclude path filtering.
//!
//! Filters are written one per line:
//!
//! ```text
//! include: src
//! include: third_party/**/include
//! exclude: src/generated
//! ```
//!
//! Each glob is resolved against the root and matches both the path itself
//! and everything below it. Exclusions win over inclusions regardless of the
//! order they are declared in. Without any `include:` line every file under
//! the root is included.

use super::glob::{GlobMatcher, normalize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter: {0}")]
    InvalidLine(String),
    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobMatcher,
    exclude: Option<GlobMatcher>,
}

impl PathFilter {
    /// Parses `filters` relative to `root`. Malformed lines fail immediately.
    pub fn new(root: &Path, filters: &str) -> Result<Self, FilterError> {
        let root = normalize(&root.to_string_lossy());
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for line in filters.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("include:") {
                push_expanded(&mut includes, &root, rest);
            } else if let Some(rest) = line.strip_prefix("exclude:") {
                push_expanded(&mut excludes, &root, rest);
            } else {
                return Err(FilterError::InvalidLine(line.to_string()));
            }
        }

        if includes.is_empty() {
            includes.push(format!("{}/**", root));
        }

        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(GlobMatcher::any(&excludes)?)
        };

        Ok(Self {
            include: GlobMatcher::any(&includes)?,
            exclude,
        })
    }

    /// A filter that accepts every file under `root`.
    pub fn everything(root: &Path) -> Result<Self, FilterError> {
        Self::new(root, "")
    }

    /// Matches an absolute path against the filters, after normalizing it.
    pub fn includes(&self, path: &Path) -> bool {
        let path = normalize(&path.to_string_lossy());
        self.include.is_match(&path) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(&path))
    }
}

fn push_expanded(patterns: &mut Vec<String>, root: &str, glob: &str) {
    let glob = glob.trim_matches(|c| c == ' ' || c == '/' || c == '\\');
    let pattern = if glob.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), glob)
    };
    patterns.push(format!("{}/**", pattern));
    patterns.push(pattern);
}
