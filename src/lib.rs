//! # buildless - compile commands for trees without a build system
//!
//! buildless takes a C/C++ source tree that has no build description and
//! still gets every translation unit through a compiler (or an extractor that
//! mimics one).
//!
//! ## Pipeline
//!
//! 1. **Scan**: walk the tree, index every file name into a suffix trie and
//!    collect the `#include` names each source needs a search path for
//! 2. **Generate**: turn trie answers (plus system include lookups) into one
//!    compiler invocation per source, persisted as `compile_commands.json`
//! 3. **Execute**: run every invocation through a response file with bounded
//!    parallelism, tallying clean, partial and failed runs
//!
//! ## Module Organization
//!
//! - [`index`] - Glob filters and the suffix trie
//! - [`scan`] - Source tree scanning
//! - [`deps`] - System include resolution
//! - [`toolchain`] - Compiler discovery and flag syntax
//! - [`build`] - Command synthesis, persistence and parallel execution
//! - [`config`] - Settings from flags, environment and `buildless.toml`

/// Command synthesis, persistence and parallel execution.
pub mod build;

/// Settings (`buildless.toml`, environment, flags).
pub mod config;

/// System include resolution for headers outside the tree.
pub mod deps;

/// Path filters and the suffix trie.
pub mod index;

/// Source tree scanning.
pub mod scan;

/// Compiler discovery.
pub mod toolchain;
