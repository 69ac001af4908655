//! System dependency resolution.
//!
//! Include names the project tree cannot satisfy are looked up below the
//! compiler's system search directories. A name found in a subdirectory
//! (`glib.h` under `/usr/include/glib-2.0`) yields that subdirectory as an
//! extra search path. Names the search list already satisfies are skipped.

use crate::index::{PathFilter, SuffixTrie};
use crate::toolchain::CompilerFlavor;
use anyhow::Result;
use colored::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Maps missing include names to directories that would satisfy them.
pub trait DependencyResolver {
    fn resolve(&self, missing: &BTreeSet<String>) -> Result<BTreeMap<String, Vec<PathBuf>>>;
}

/// How deep below each system directory headers are indexed.
const SYSTEM_INDEX_DEPTH: usize = 4;

pub struct SystemIncludeResolver {
    search_dirs: Vec<PathBuf>,
    verbose: bool,
}

impl SystemIncludeResolver {
    pub fn new(search_dirs: Vec<PathBuf>, verbose: bool) -> Self {
        Self {
            search_dirs,
            verbose,
        }
    }

    /// Uses the search list reported by `compiler`.
    pub fn for_compiler(compiler: &CompilerFlavor, verbose: bool) -> Self {
        let dirs = system_include_dirs(compiler);
        if verbose {
            for dir in &dirs {
                println!("   {} System include dir: {}", "🔎".cyan(), dir.display());
            }
        }
        Self::new(dirs, verbose)
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }
}

impl DependencyResolver for SystemIncludeResolver {
    fn resolve(&self, missing: &BTreeSet<String>) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut resolved: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        if missing.is_empty() {
            return Ok(resolved);
        }

        let pending: Vec<&String> = missing
            .iter()
            .filter(|name| {
                !self
                    .search_dirs
                    .iter()
                    .any(|dir| dir.join(name.as_str()).is_file())
            })
            .collect();
        if pending.is_empty() {
            return Ok(resolved);
        }

        for dir in &self.search_dirs {
            let trie = index_system_dir(dir)?;
            for name in &pending {
                for found in trie.include_dirs(name) {
                    let dirs = resolved.entry((*name).clone()).or_default();
                    if !dirs.contains(&found) {
                        if self.verbose {
                            println!(
                                "   {} {} -> {}",
                                "+".green(),
                                name,
                                found.display()
                            );
                        }
                        dirs.push(found);
                    }
                }
            }
        }

        Ok(resolved)
    }
}

fn index_system_dir(dir: &Path) -> Result<SuffixTrie> {
    let filter = PathFilter::everything(dir)?;
    let mut trie = SuffixTrie::new();
    let root = dir.to_string_lossy().to_string();
    for entry in walkdir::WalkDir::new(dir)
        .max_depth(SYSTEM_INDEX_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file()
            && filter.includes(entry.path())
            && let Some(relative) = crate::index::trie::relative_name(dir, entry.path())
        {
            trie.insert(&relative, &root);
        }
    }
    Ok(trie)
}

/// Directories the compiler searches for `<...>` includes.
pub fn system_include_dirs(compiler: &CompilerFlavor) -> Vec<PathBuf> {
    let dirs = match compiler {
        CompilerFlavor::Clang { clangpp, .. } => query_clang_search_dirs(clangpp),
        CompilerFlavor::Msvc { .. } => std::env::var_os("INCLUDE")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default(),
    };

    if !dirs.is_empty() {
        return dirs;
    }
    ["/usr/local/include", "/usr/include"]
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .collect()
}

fn query_clang_search_dirs(clangpp: &Path) -> Vec<PathBuf> {
    let output = Command::new(clangpp)
        .args(["-E", "-x", "c++", "-", "-v"])
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(out) => parse_search_list(&String::from_utf8_lossy(&out.stderr)),
        Err(_) => Vec::new(),
    }
}

/// Extracts the `#include <...>` search list from `clang -v` output.
pub fn parse_search_list(verbose_output: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut in_list = false;
    for line in verbose_output.lines() {
        if line.starts_with("#include <...> search starts here:") {
            in_list = true;
        } else if line.starts_with("End of search list.") {
            break;
        } else if in_list {
            let entry = line.trim().trim_end_matches(" (framework directory)");
            if !entry.is_empty() {
                dirs.push(PathBuf::from(entry));
            }
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_search_list() {
        let out = "clang version 17\n\
            #include \"...\" search starts here:\n\
            #include <...> search starts here:\n \
            /usr/lib/llvm/include\n \
            /usr/include\n \
            /Library/Frameworks (framework directory)\n\
            End of search list.\n";
        assert_eq!(
            parse_search_list(out),
            vec![
                PathBuf::from("/usr/lib/llvm/include"),
                PathBuf::from("/usr/include"),
                PathBuf::from("/Library/Frameworks"),
            ]
        );
    }

    #[test]
    fn test_resolves_names_in_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sys = dir.path();
        fs::create_dir_all(sys.join("glib-2.0/glib")).unwrap();
        fs::write(sys.join("glib-2.0/glib.h"), "").unwrap();
        fs::write(sys.join("glib-2.0/glib/gtypes.h"), "").unwrap();
        fs::write(sys.join("stdio.h"), "").unwrap();

        let resolver = SystemIncludeResolver::new(vec![sys.to_path_buf()], false);
        let missing: BTreeSet<String> = ["glib.h", "glib/gtypes.h", "stdio.h", "nope.h"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let resolved = resolver.resolve(&missing).unwrap();

        assert_eq!(resolved["glib.h"], vec![sys.join("glib-2.0")]);
        assert_eq!(resolved["glib/gtypes.h"], vec![sys.join("glib-2.0")]);
        assert!(!resolved.contains_key("stdio.h"));
        assert!(!resolved.contains_key("nope.h"));
    }

    #[test]
    fn test_search_dir_with_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("gcc/13")).unwrap();
        fs::create_dir_all(dir.path().join("sys/glib-2.0")).unwrap();
        fs::write(dir.path().join("sys/glib-2.0/glib.h"), "").unwrap();

        let search_dir = dir.path().join("gcc/13/../../sys");
        let resolver = SystemIncludeResolver::new(vec![search_dir], false);
        let missing: BTreeSet<String> = BTreeSet::from(["glib.h".to_string()]);
        let resolved = resolver.resolve(&missing).unwrap();

        assert_eq!(resolved["glib.h"].len(), 1);
        assert!(resolved["glib.h"][0].ends_with("glib-2.0"));
        assert!(resolved["glib.h"][0].join("glib.h").is_file());
    }

    #[test]
    fn test_nothing_missing_resolves_nothing() {
        let resolver = SystemIncludeResolver::new(vec![PathBuf::from("/nonexistent")], false);
        assert!(resolver.resolve(&BTreeSet::new()).unwrap().is_empty());
    }
}
