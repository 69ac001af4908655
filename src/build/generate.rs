use super::compile_db::{CommandSpec, CompileCommand};
use crate::deps::DependencyResolver;
use crate::index::SuffixTrie;
use crate::scan::ScanResult;
use crate::toolchain::CompilerFlavor;
use anyhow::Result;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Suffix appended to each source path to form its declared output.
pub const OUTPUT_SUFFIX: &str = ".o";

/// Synthesizes one compiler invocation per source file.
pub struct CompileCommands<'a> {
    compiler: &'a CompilerFlavor,
    trie: &'a SuffixTrie,
    resolver: Option<&'a dyn DependencyResolver>,
}

struct ResolvedIncludes {
    dirs: Vec<PathBuf>,
    missing: Vec<String>,
}

fn push_unique(dirs: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, dir: PathBuf) {
    if seen.insert(dir.clone()) {
        dirs.push(dir);
    }
}

pub fn is_c_source(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".c")
}

impl<'a> CompileCommands<'a> {
    pub fn new(compiler: &'a CompilerFlavor, trie: &'a SuffixTrie) -> Self {
        Self {
            compiler,
            trie,
            resolver: None,
        }
    }

    /// Enables system dependency resolution for names the trie cannot find.
    pub fn with_resolver(mut self, resolver: &'a dyn DependencyResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn resolve_local(&self, names: &[String]) -> ResolvedIncludes {
        let mut dirs = Vec::new();
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for name in names {
            let found = self.trie.include_dirs(name);
            if found.is_empty() {
                missing.push(name.clone());
            }
            for dir in found {
                push_unique(&mut dirs, &mut seen, dir);
            }
        }
        ResolvedIncludes { dirs, missing }
    }

    /// Returns the command specifications, ordered by source path.
    pub fn get_compile_commands(&self, scan: &ScanResult) -> Result<Vec<CommandSpec>> {
        let mut resolved: Vec<(&PathBuf, ResolvedIncludes)> = scan
            .source_files
            .iter()
            .map(|src| (src, self.resolve_local(scan.unresolved_for(src))))
            .collect();

        if let Some(resolver) = self.resolver {
            let missing: BTreeSet<String> = resolved
                .iter()
                .flat_map(|(_, r)| r.missing.iter().cloned())
                .collect();
            let system = resolver.resolve(&missing)?;

            for (_, includes) in &mut resolved {
                let mut seen: HashSet<PathBuf> = includes.dirs.iter().cloned().collect();
                for name in &includes.missing {
                    for dir in system.get(name).into_iter().flatten() {
                        push_unique(&mut includes.dirs, &mut seen, dir.clone());
                    }
                }
            }
        }

        Ok(resolved
            .into_iter()
            .map(|(src, includes)| self.command_for(&scan.root, src, &includes.dirs))
            .collect())
    }

    fn command_for(&self, directory: &Path, src: &Path, include_dirs: &[PathBuf]) -> CommandSpec {
        let mut arguments = if is_c_source(src) {
            self.compiler.c_compiler_prefix()
        } else {
            self.compiler.cpp_compiler_prefix()
        };
        for dir in include_dirs {
            arguments.push(self.compiler.include(dir));
        }

        let src_str = src.to_string_lossy().to_string();
        let output = format!("{}{}", src_str, OUTPUT_SUFFIX);
        arguments.extend(self.compiler.output(&output));
        arguments.extend(self.compiler.source(&src_str));

        CommandSpec {
            directory: directory.to_path_buf(),
            file: src.to_path_buf(),
            arguments,
            output,
        }
    }

    /// Convenience wrapper producing the persisted form directly.
    pub fn compile_commands(&self, scan: &ScanResult) -> Result<Vec<CompileCommand>> {
        self.get_compile_commands(scan)?
            .iter()
            .map(CommandSpec::to_compile_command)
            .collect()
    }
}
