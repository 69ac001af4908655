use super::compile_db::{CompileCommand, read_compile_commands, write_compile_commands};
use super::executor::{Tally, run_commands_in_parallel};
use super::generate::CompileCommands;
use super::invoke::{InvocationContext, invocations};
use crate::config::Settings;
use crate::deps::SystemIncludeResolver;
use crate::index::PathFilter;
use crate::scan;
use crate::toolchain::CompilerFlavor;
use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

// --- CORE: Generate compile_commands.json ---
pub fn generate_compile_commands_json(
    root: &Path,
    settings: &Settings,
    compiler: &CompilerFlavor,
    json_file: &Path,
) -> Result<Vec<CompileCommand>> {
    let start_time = Instant::now();
    println!("{} Generating compilation commands...", "⚙".cyan());

    // 1. Filters fail fast, before anything is walked
    let filter = PathFilter::new(root, &settings.filters)
        .context("Invalid index filters (BUILDLESS_INDEX_FILTERS)")?;

    // 2. Scan + index
    let (scan_result, trie) = scan::scan_dir(root, &filter, settings.follow_symlinks);
    if scan_result.source_files.is_empty() {
        println!("{} No source files found.", "!".yellow());
    } else {
        println!(
            "   {} Found {} source files, {} distinct file names",
            "🔍".cyan(),
            scan_result.source_files.len(),
            trie.len()
        );
    }

    // 3. Synthesize
    let generator = CompileCommands::new(compiler, &trie);
    let resolver;
    let generator = if settings.system_includes {
        println!("{} Scanning system directories", "🔎".cyan());
        resolver = SystemIncludeResolver::for_compiler(compiler, settings.verbose);
        generator.with_resolver(&resolver)
    } else {
        generator
    };
    let commands = generator.compile_commands(&scan_result)?;

    // 4. Persist
    write_compile_commands(&commands, json_file)?;
    println!(
        "{} Generated {} commands in {:.2?}",
        "✓".green(),
        commands.len(),
        start_time.elapsed()
    );
    Ok(commands)
}

/// Executes the persisted compiler invocations directly.
pub fn run_compile_commands_json(
    compiler: CompilerFlavor,
    json_file: &Path,
    threads: usize,
    ctx: InvocationContext,
) -> Result<Tally> {
    println!("{} Running compile commands", "▶".green());
    let commands = read_compile_commands(json_file)?;
    let compiler_invocations = invocations(&commands, None)?;
    run_commands_in_parallel(
        compiler_invocations,
        threads,
        Arc::new(compiler),
        Arc::new(ctx),
    )
}

/// Launches the extractor for each persisted command, mimicking the compiler.
pub fn extract_compile_commands_json(
    extractor: &Path,
    compiler: CompilerFlavor,
    json_file: &Path,
    threads: usize,
    ctx: InvocationContext,
) -> Result<Tally> {
    println!("{} Extracting compile commands", "▶".green());
    let commands = read_compile_commands(json_file)?;
    let extractor_invocations = invocations(&commands, Some(extractor))?;
    run_commands_in_parallel(
        extractor_invocations,
        threads,
        Arc::new(compiler),
        Arc::new(ctx),
    )
}
