//! The persisted command list (`compile_commands.json`).
//!
//! This file is the hand-off between generation and execution: each entry
//! holds the working directory, the full shell-quoted command, the declared
//! output and the source file.

use anyhow::{Context, Result, anyhow};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    pub directory: String,
    pub command: String,
    pub output: String,
    pub file: String,
}

/// A synthesized compiler invocation before it is quoted for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub arguments: Vec<String>,
    pub output: String,
}

impl CommandSpec {
    pub fn to_compile_command(&self) -> Result<CompileCommand> {
        let command = shlex::try_join(self.arguments.iter().map(String::as_str))
            .with_context(|| format!("Cannot quote command for {}", self.file.display()))?;
        Ok(CompileCommand {
            directory: self.directory.to_string_lossy().to_string(),
            command,
            output: self.output.clone(),
            file: self.file.to_string_lossy().to_string(),
        })
    }
}

impl CompileCommand {
    /// Splits `command` back into its argument vector.
    pub fn arguments(&self) -> Result<Vec<String>> {
        shlex::split(&self.command)
            .ok_or_else(|| anyhow!("Malformed quoting in command for {}", self.file))
    }
}

pub fn to_json(commands: &[CompileCommand]) -> Result<String> {
    Ok(serde_json::to_string_pretty(commands)?)
}

pub fn write_compile_commands(commands: &[CompileCommand], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, to_json(commands)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Written {}", "✓".green(), path.display());
    Ok(())
}

pub fn read_compile_commands(path: &Path) -> Result<Vec<CompileCommand>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {} - expected a list of compile commands", path.display()))
}
