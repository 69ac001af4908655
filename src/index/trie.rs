//! Suffix trie over file paths.
//!
//! Paths are inserted component by component in reverse, so `a/b/c.h`
//! becomes `c.h -> b -> a -> <root>`. Looking up a trailing fragment then
//! yields every directory that fragment was found under:
//!
//! - `c.h` -> `[<root>, a, b]`
//! - `b/c.h` -> `[<root>, a]`
//!
//! The trie only understands root-relative suffixes. Absolute queries never
//! match anything.

use super::filter::PathFilter;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf, is_separator};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone)]
pub struct SuffixTrie {
    children: BTreeMap<String, SuffixTrie>,
    /// Root markers of paths that end exactly at this node.
    roots: BTreeSet<String>,
}

/// Splits off the final component, mirroring POSIX `dirname`/`basename`:
/// trailing separators are stripped from the head unless it is all separators.
fn split_last(path: &str) -> (&str, &str) {
    match path.rfind(is_separator) {
        Some(i) => {
            let head = &path[..=i];
            let tail = &path[i + 1..];
            let trimmed = head.trim_end_matches(is_separator);
            (if trimmed.is_empty() { head } else { trimmed }, tail)
        }
        None => ("", path),
    }
}

fn is_root_head(head: &str) -> bool {
    head.chars().all(is_separator)
}

impl SuffixTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.roots.is_empty()
    }

    /// Number of distinct final components (file names) indexed.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Inserts a root-relative path, recording `root` as the marker at its end.
    pub fn insert(&mut self, item: &str, root: &str) {
        let (head, last) = split_last(item);
        let child = self.children.entry(last.to_string()).or_default();
        if is_root_head(head) {
            child.roots.insert(root.to_string());
        } else {
            child.insert(head, root);
        }
    }

    pub fn add_files<I, S>(&mut self, items: I, root: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in items {
            self.insert(item.as_ref(), root);
        }
    }

    /// Replaces the trie content with every file below `root_dir` accepted by `filter`.
    pub fn bulk_index(&mut self, root_dir: &Path, filter: &PathFilter, follow_symlinks: bool) {
        self.children.clear();
        self.roots.clear();

        let root_str = root_dir.to_string_lossy().to_string();
        for entry in WalkDir::new(root_dir)
            .follow_links(follow_symlinks)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !filter.includes(entry.path()) {
                continue;
            }
            if let Some(relative) = relative_name(root_dir, entry.path()) {
                self.insert(&relative, &root_str);
            }
        }
    }

    /// Builds a fresh trie for `root_dir`.
    pub fn of_dir(root_dir: &Path, filter: &PathFilter, follow_symlinks: bool) -> Self {
        let mut trie = Self::new();
        trie.bulk_index(root_dir, filter, follow_symlinks);
        trie
    }

    /// Every directory chain (root marker first) under which `query` was indexed.
    pub fn lookup(&self, query: &str) -> Vec<Vec<String>> {
        let (head, last) = split_last(query);
        if last.is_empty() {
            if !head.is_empty() {
                return Vec::new();
            }
            return self.all_paths();
        }

        match self.children.get(last) {
            Some(child) => child.lookup(head),
            None => Vec::new(),
        }
    }

    /// Like [`lookup`](Self::lookup), with each chain joined into a directory.
    pub fn include_dirs(&self, query: &str) -> Vec<PathBuf> {
        self.lookup(query)
            .into_iter()
            .map(|chain| chain.iter().collect())
            .collect()
    }

    /// Every indexed chain, ordered root marker first.
    pub fn all_paths(&self) -> Vec<Vec<String>> {
        let mut result: Vec<Vec<String>> = self.roots.iter().map(|r| vec![r.clone()]).collect();
        for (key, child) in &self.children {
            for mut path in child.all_paths() {
                path.push(key.clone());
                result.push(path);
            }
        }
        result
    }
}

/// `path` relative to `root`, joined with `/`.
pub(crate) fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
