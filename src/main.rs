//! # buildless CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the handlers in the
//! library.
//!
//! ## Command Structure
//!
//! - **Generate**: `generate` writes `compile_commands.json` for a tree
//! - **Execute**: `run` (compiler) and `extract` (extractor in mimic mode)
//! - **One-shot**: `auto` generates then extracts
//! - **Diagnostics**: `index lookup`, `index paths`
//! - **Shell**: `completions`

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

use buildless::build;
use buildless::config::{self, Overrides, Settings};
use buildless::index::{PathFilter, SuffixTrie};
use buildless::toolchain::{self, CompilerFlavor};

const COMPILE_COMMANDS: &str = "compile_commands.json";

#[derive(Parser)]
#[command(name = "buildless")]
#[command(about = "Compile or extract C/C++ trees that have no build system", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Index filters, one `include: <glob>` or `exclude: <glob>` per line
    #[arg(long, global = true, env = "BUILDLESS_INDEX_FILTERS")]
    filters: Option<String>,
    /// Read index filters from a file (takes precedence over --filters)
    #[arg(long, global = true)]
    filters_file: Option<PathBuf>,
    /// Follow symbolic links while scanning
    #[arg(long, global = true, env = "BUILDLESS_FOLLOW_SYMLINKS")]
    follow_symlinks: bool,
    /// Preferred compiler family (msvc or clang)
    #[arg(long, global = true, env = "BUILDLESS_COMPILER")]
    compiler: Option<String>,
    /// Number of commands to run at once (0 = one per CPU)
    #[arg(short = 'j', long, global = true, env = "BUILDLESS_THREADS")]
    threads: Option<usize>,
    /// Print launched commands and let their output through
    #[arg(short, long, global = true, env = "BUILDLESS_VERBOSE")]
    verbose: bool,
    /// Do not search system include directories for missing headers
    #[arg(long, global = true, env = "BUILDLESS_NO_SYSTEM_INCLUDES")]
    no_system_includes: bool,
    /// Directory for response files
    #[arg(long, global = true, env = "BUILDLESS_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
    /// Directory for per-command logs
    #[arg(long, global = true, env = "BUILDLESS_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a source tree and write compile_commands.json
    Generate {
        /// Root of the source tree
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Output file [default: <root>/compile_commands.json]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the compiler for every entry of a command list
    Run {
        /// Command list to execute
        #[arg(short, long, default_value = COMPILE_COMMANDS)]
        input: PathBuf,
    },
    /// Run an extractor in mimic mode for every entry of a command list
    Extract {
        /// Extractor executable, invoked as `<extractor> --mimic <compiler> @<args>`
        #[arg(long, env = "BUILDLESS_EXTRACTOR")]
        extractor: PathBuf,
        /// Command list to execute
        #[arg(short, long, default_value = COMPILE_COMMANDS)]
        input: PathBuf,
    },
    /// Generate commands into the log directory, then extract them
    Auto {
        /// Extractor executable
        #[arg(long, env = "BUILDLESS_EXTRACTOR")]
        extractor: PathBuf,
        /// Root of the source tree
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Inspect the file index of a tree
    Index {
        #[command(subcommand)]
        op: IndexOp,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IndexOp {
    /// List directories containing a file name or trailing path fragment
    Lookup {
        /// File name or suffix, e.g. `api.h` or `util/api.h`
        query: String,
        /// Root of the source tree
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// List every indexed path
    Paths {
        /// Root of the source tree
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { root, output } => {
            let root = canonical_root(root)?;
            let settings = resolve_settings(&cli.global, &root)?;
            let compiler = detect_compiler(&settings)?;
            let output = output
                .clone()
                .unwrap_or_else(|| root.join(COMPILE_COMMANDS));
            build::generate_compile_commands_json(&root, &settings, &compiler, &output)?;
            Ok(())
        }

        Commands::Run { input } => {
            let settings = resolve_settings(&cli.global, &std::env::current_dir()?)?;
            let ctx = settings.invocation_context()?;
            let compiler = detect_compiler(&settings)?;
            build::run_compile_commands_json(compiler, input, settings.threads, ctx)?;
            Ok(())
        }

        Commands::Extract { extractor, input } => {
            let settings = resolve_settings(&cli.global, &std::env::current_dir()?)?;
            let ctx = settings.invocation_context()?;
            let compiler = detect_compiler(&settings)?;
            build::extract_compile_commands_json(
                extractor,
                compiler,
                input,
                settings.threads,
                ctx,
            )?;
            Ok(())
        }

        Commands::Auto { extractor, root } => {
            let root = canonical_root(root)?;
            let settings = resolve_settings(&cli.global, &root)?;
            let ctx = settings.invocation_context()?;
            let json_file = settings.log_dir()?.join(COMPILE_COMMANDS);
            let compiler = detect_compiler(&settings)?;

            build::generate_compile_commands_json(&root, &settings, &compiler, &json_file)?;
            build::extract_compile_commands_json(
                extractor,
                compiler,
                &json_file,
                settings.threads,
                ctx,
            )?;
            Ok(())
        }

        Commands::Index { op } => match op {
            IndexOp::Lookup { query, root } => {
                let trie = index_tree(&cli.global, root)?;
                let dirs = trie.include_dirs(query);
                if dirs.is_empty() {
                    println!("{} No indexed path ends with '{}'", "x".red(), query);
                }
                for dir in dirs {
                    println!("{}", dir.display());
                }
                Ok(())
            }
            IndexOp::Paths { root } => {
                let trie = index_tree(&cli.global, root)?;
                for path in trie.all_paths() {
                    println!("{}", path.iter().collect::<PathBuf>().display());
                }
                Ok(())
            }
        },

        Commands::Completions { shell } => {
            generate(
                *shell,
                &mut Cli::command(),
                "buildless",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    fs::canonicalize(root)
        .with_context(|| format!("Source root {} does not exist", root.display()))
}

fn resolve_settings(global: &GlobalArgs, root: &Path) -> Result<Settings> {
    let filters = match &global.filters_file {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read filters from {}", path.display()))?,
        ),
        None => global.filters.clone(),
    };

    let overrides = Overrides {
        filters,
        follow_symlinks: global.follow_symlinks,
        compiler: global.compiler.clone(),
        threads: global.threads,
        verbose: global.verbose,
        no_system_includes: global.no_system_includes,
        scratch_dir: global.scratch_dir.clone(),
        log_dir: global.log_dir.clone(),
    };
    Ok(Settings::resolve(overrides, config::load_config(root)?)?)
}

fn detect_compiler(settings: &Settings) -> Result<CompilerFlavor> {
    match toolchain::find_compiler(settings.compiler) {
        Ok(compiler) => {
            println!(
                "   {} Detected compiler: {}",
                "🔧".cyan(),
                compiler.cxx_path().display()
            );
            Ok(compiler)
        }
        Err(e) => {
            println!("{} {}", "x".red(), e);
            Err(e.into())
        }
    }
}

fn index_tree(global: &GlobalArgs, root: &Path) -> Result<SuffixTrie> {
    let root = canonical_root(root)?;
    let settings = resolve_settings(global, &root)?;
    let filter = PathFilter::new(&root, &settings.filters)?;
    Ok(SuffixTrie::of_dir(&root, &filter, settings.follow_symlinks))
}
