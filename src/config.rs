//! Settings
//!
//! Every setting can come from a command-line flag, a `BUILDLESS_*`
//! environment variable (both handled by clap), or an optional
//! `buildless.toml` at the scanned root:
//!
//! ```toml
//! [index]
//! filters = """
//! include: src
//! exclude: src/generated
//! """
//! follow_symlinks = false
//!
//! [compiler]
//! prefer = "clang"
//! system_includes = true
//!
//! [run]
//! threads = 8
//! verbose = false
//! scratch_dir = "/tmp/buildless/scratch"
//! log_dir = "/tmp/buildless/log"
//! ```
//!
//! Flags and environment win over the file, the file wins over defaults.

use crate::build::InvocationContext;
use crate::toolchain::{CompilerType, ToolchainError};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "buildless.toml";

#[derive(Deserialize, Debug, Default)]
pub struct BuildlessConfig {
    pub index: Option<IndexConfig>,
    pub compiler: Option<CompilerConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Deserialize, Debug, Default)]
pub struct IndexConfig {
    pub filters: Option<String>,
    pub follow_symlinks: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CompilerConfig {
    pub prefer: Option<String>,
    pub system_includes: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RunConfig {
    pub threads: Option<usize>,
    pub verbose: Option<bool>,
    pub scratch_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Unset(&'static str),
    #[error("{name} ({}) is not a directory", path.display())]
    NotADirectory { name: &'static str, path: PathBuf },
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

/// Loads `buildless.toml` from `root`; a missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<BuildlessConfig> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(BuildlessConfig::default());
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| {
        format!(
            "Failed to parse {} - check for syntax errors (missing quotes, brackets)",
            path.display()
        )
    })
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub filters: Option<String>,
    pub follow_symlinks: bool,
    pub compiler: Option<String>,
    pub threads: Option<usize>,
    pub verbose: bool,
    pub no_system_includes: bool,
    pub scratch_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// `include:`/`exclude:` filter text
    pub filters: String,
    pub follow_symlinks: bool,
    pub compiler: Option<CompilerType>,
    /// Resolved worker count, always at least 1
    pub threads: usize,
    pub verbose: bool,
    pub system_includes: bool,
    pub scratch_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: BuildlessConfig) -> Result<Self, ConfigError> {
        let index = file.index.unwrap_or_default();
        let compiler_cfg = file.compiler.unwrap_or_default();
        let run = file.run.unwrap_or_default();

        let compiler = match overrides.compiler.or(compiler_cfg.prefer) {
            Some(name) => Some(
                CompilerType::parse(&name).ok_or(ToolchainError::UnknownCompiler(name))?,
            ),
            None => None,
        };

        Ok(Self {
            filters: overrides.filters.or(index.filters).unwrap_or_default(),
            follow_symlinks: overrides.follow_symlinks || index.follow_symlinks.unwrap_or(false),
            compiler,
            threads: thread_count(overrides.threads.or(run.threads)),
            verbose: overrides.verbose || run.verbose.unwrap_or(false),
            system_includes: !overrides.no_system_includes
                && compiler_cfg.system_includes.unwrap_or(true),
            scratch_dir: overrides.scratch_dir.or(run.scratch_dir),
            log_dir: overrides.log_dir.or(run.log_dir),
        })
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        require_dir("BUILDLESS_LOG_DIR", self.log_dir.as_deref())
    }

    /// Checks the scratch (and, unless verbose, log) directory before any work starts.
    pub fn invocation_context(&self) -> Result<InvocationContext, ConfigError> {
        let scratch_dir = require_dir("BUILDLESS_SCRATCH_DIR", self.scratch_dir.as_deref())?;
        let log_dir = if self.verbose {
            None
        } else {
            Some(self.log_dir()?)
        };
        Ok(InvocationContext {
            scratch_dir,
            log_dir,
            verbose: self.verbose,
        })
    }
}

/// `0` or unset means one worker per available CPU.
pub fn thread_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) if n > 0 => n,
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

pub fn require_dir(name: &'static str, value: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = value.ok_or(ConfigError::Unset(name))?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory {
            name,
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(Overrides::default(), BuildlessConfig::default()).unwrap();
        assert_eq!(settings.filters, "");
        assert!(settings.system_includes);
        assert!(!settings.verbose);
        assert!(settings.threads >= 1);
        assert!(settings.compiler.is_none());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file: BuildlessConfig = toml::from_str(
            r#"
            [index]
            filters = "include: src"
            [compiler]
            prefer = "msvc"
            system_includes = false
            [run]
            threads = 3
            "#,
        )
        .unwrap();
        let overrides = Overrides {
            filters: Some("include: lib".to_string()),
            compiler: Some("clang".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(overrides, file).unwrap();
        assert_eq!(settings.filters, "include: lib");
        assert_eq!(settings.compiler, Some(CompilerType::Clang));
        assert_eq!(settings.threads, 3);
        assert!(!settings.system_includes);
    }

    #[test]
    fn test_unknown_compiler_is_rejected() {
        let overrides = Overrides {
            compiler: Some("tcc".to_string()),
            ..Default::default()
        };
        let err = Settings::resolve(overrides, BuildlessConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tcc"));
    }

    #[test]
    fn test_thread_count() {
        assert_eq!(thread_count(Some(4)), 4);
        assert!(thread_count(Some(0)) >= 1);
        assert!(thread_count(None) >= 1);
    }

    #[test]
    fn test_required_dirs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            require_dir("BUILDLESS_LOG_DIR", None),
            Err(ConfigError::Unset("BUILDLESS_LOG_DIR"))
        ));
        let file = dir.path().join("f");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            require_dir("X", Some(file.as_path())),
            Err(ConfigError::NotADirectory { .. })
        ));
        assert_eq!(require_dir("X", Some(dir.path())).unwrap(), dir.path());
    }

    #[test]
    fn test_verbose_runs_need_no_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            verbose: true,
            scratch_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let settings = Settings::resolve(overrides, BuildlessConfig::default()).unwrap();
        let ctx = settings.invocation_context().unwrap();
        assert!(ctx.log_dir.is_none());

        let quiet = Settings {
            verbose: false,
            ..settings
        };
        assert!(quiet.invocation_context().is_err());
    }

    #[test]
    fn test_load_config_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert!(cfg.index.is_none());

        fs::write(dir.path().join(CONFIG_FILE), "[index\nbroken").unwrap();
        assert!(load_config(dir.path()).is_err());
    }
}
