//! Source tree scanning.
//!
//! Walks a directory once, indexing every accepted file into a [`SuffixTrie`]
//! and reading `#include` lines from sources and headers. For each source file
//! the scanner records the include names that cannot be satisfied next to the
//! including file, following headers found inside the tree so their includes
//! count for every translation unit that reaches them.

use crate::index::glob::normalize;
use crate::index::trie::relative_name;
use crate::index::{PathFilter, SuffixTrie};
use colored::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++", "cp"];
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "inl", "ipp", "tpp"];

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^">\r\n]+)[">]"#)
        .expect("include pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub name: String,
    /// `#include "..."` rather than `#include <...>`
    pub quoted: bool,
}

/// What the scanner found under a root.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    pub root: PathBuf,
    pub source_files: BTreeSet<PathBuf>,
    /// Per source file, include names that need a search directory, in first-seen order.
    pub unresolved_includes: BTreeMap<PathBuf, Vec<String>>,
}

impl ScanResult {
    pub fn unresolved_for(&self, source: &Path) -> &[String] {
        self.unresolved_includes
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn parse_includes(content: &str) -> Vec<IncludeDirective> {
    INCLUDE_RE
        .captures_iter(content)
        .map(|caps| IncludeDirective {
            name: caps[2].trim().to_string(),
            quoted: &caps[1] == "\"",
        })
        .collect()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_source_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_header_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| HEADER_EXTENSIONS.contains(&e.as_str()))
}

#[derive(Debug, Default)]
pub struct FolderScanner {
    pub trie: SuffixTrie,
    directives: HashMap<PathBuf, Vec<IncludeDirective>>,
    source_files: BTreeSet<PathBuf>,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks `root`, replacing anything scanned before.
    pub fn scan_dir(&mut self, root: &Path, filter: &PathFilter, follow_symlinks: bool) {
        *self = Self::default();
        let root_str = root.to_string_lossy().to_string();

        for entry in WalkDir::new(root)
            .follow_links(follow_symlinks)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !filter.includes(path) {
                continue;
            }
            if let Some(relative) = relative_name(root, path) {
                self.trie.insert(&relative, &root_str);
            }

            let is_source = is_source_file(path);
            if !is_source && !is_header_file(path) {
                continue;
            }
            match fs::read(path) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes);
                    self.directives
                        .insert(path.to_path_buf(), parse_includes(&content));
                }
                Err(e) => {
                    println!("   {} Could not read {}: {}", "!".yellow(), path.display(), e);
                    continue;
                }
            }
            if is_source {
                self.source_files.insert(path.to_path_buf());
            }
        }
    }

    /// Include names reachable from `source` that need a search directory.
    pub fn unresolved_includes(&self, source: &Path) -> Vec<String> {
        let mut unresolved = Vec::new();
        let mut seen_names = HashSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([source.to_path_buf()]);

        while let Some(file) = queue.pop_front() {
            if !visited.insert(file.clone()) {
                continue;
            }
            let Some(directives) = self.directives.get(&file) else {
                continue;
            };
            let dir = file.parent().unwrap_or(Path::new(""));

            for directive in directives {
                if directive.quoted {
                    let sibling = normalized(&dir.join(&directive.name));
                    if sibling.is_file() {
                        queue.push_back(sibling);
                        continue;
                    }
                }

                if seen_names.insert(directive.name.clone()) {
                    unresolved.push(directive.name.clone());
                }
                for include_dir in self.trie.include_dirs(&directive.name) {
                    queue.push_back(normalized(&include_dir.join(&directive.name)));
                }
            }
        }

        unresolved
    }

    pub fn into_result(self, root: &Path) -> (ScanResult, SuffixTrie) {
        let unresolved_includes = self
            .source_files
            .iter()
            .map(|src| (src.clone(), self.unresolved_includes(src)))
            .collect();
        let result = ScanResult {
            root: root.to_path_buf(),
            source_files: self.source_files,
            unresolved_includes,
        };
        (result, self.trie)
    }
}

fn normalized(path: &Path) -> PathBuf {
    PathBuf::from(normalize(&path.to_string_lossy()))
}

/// Scans `root` and returns the scan result together with the populated trie.
pub fn scan_dir(root: &Path, filter: &PathFilter, follow_symlinks: bool) -> (ScanResult, SuffixTrie) {
    let mut scanner = FolderScanner::new();
    scanner.scan_dir(root, filter, follow_symlinks);
    scanner.into_result(root)
}
