use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported compiler families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(clippy::upper_case_acronyms)]
pub enum CompilerType {
    /// Microsoft Visual C++ (cl.exe)
    MSVC,
    /// Clang/LLVM (clang and clang++)
    Clang,
}

impl CompilerType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "msvc" | "cl" | "cl.exe" => Some(CompilerType::MSVC),
            "clang" | "clang++" | "llvm" => Some(CompilerType::Clang),
            _ => None,
        }
    }
}

/// The flag syntax and response-file rules of one compiler family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerFlavor {
    Clang { clang: PathBuf, clangpp: PathBuf },
    Msvc { cl: PathBuf },
}

impl CompilerFlavor {
    pub fn compiler_type(&self) -> CompilerType {
        match self {
            CompilerFlavor::Clang { .. } => CompilerType::Clang,
            CompilerFlavor::Msvc { .. } => CompilerType::MSVC,
        }
    }

    /// The compiler used for C++ translation units.
    pub fn cxx_path(&self) -> &Path {
        match self {
            CompilerFlavor::Clang { clangpp, .. } => clangpp,
            CompilerFlavor::Msvc { cl } => cl,
        }
    }

    pub fn cpp_compiler_prefix(&self) -> Vec<String> {
        match self {
            CompilerFlavor::Clang { clangpp, .. } => vec![
                clangpp.to_string_lossy().to_string(),
                "-std=c++20".to_string(),
                "-fexceptions".to_string(),
                "-c".to_string(),
                "-fsyntax-only".to_string(),
            ],
            CompilerFlavor::Msvc { cl } => vec![
                cl.to_string_lossy().to_string(),
                "/std:c++latest".to_string(),
                "/Zs".to_string(),
                "/EHs".to_string(),
                "/permissive".to_string(),
            ],
        }
    }

    pub fn c_compiler_prefix(&self) -> Vec<String> {
        match self {
            CompilerFlavor::Clang { clang, .. } => vec![
                clang.to_string_lossy().to_string(),
                "-c".to_string(),
                "-fsyntax-only".to_string(),
            ],
            CompilerFlavor::Msvc { cl } => {
                vec![cl.to_string_lossy().to_string(), "/Zs".to_string()]
            }
        }
    }

    pub fn include(&self, dir: &Path) -> String {
        match self {
            CompilerFlavor::Clang { .. } => format!("-I{}", dir.display()),
            CompilerFlavor::Msvc { .. } => format!("/I{}", dir.display()),
        }
    }

    pub fn output(&self, out: &str) -> Vec<String> {
        match self {
            CompilerFlavor::Clang { .. } => vec!["-o".to_string(), out.to_string()],
            CompilerFlavor::Msvc { .. } => vec![format!("/Fo{}", out)],
        }
    }

    pub fn source(&self, src: &str) -> Vec<String> {
        vec![src.to_string()]
    }

    /// Serializes `args` in the form this compiler expects behind an `@file` argument.
    ///
    /// Clang takes a single shell-quoted line; cl takes one raw argument per line.
    pub fn write_response_file<W: Write>(&self, out: &mut W, args: &[String]) -> io::Result<()> {
        match self {
            CompilerFlavor::Clang { .. } => {
                let line = shlex::try_join(args.iter().map(String::as_str))
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                out.write_all(line.as_bytes())
            }
            CompilerFlavor::Msvc { .. } => {
                for arg in args {
                    writeln!(out, "{}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// Error type for toolchain operations
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// No suitable toolchain found
    #[error("No suitable C++ compiler was found. {0}")]
    NotFound(String),
    #[error("Unknown compiler '{0}' (expected 'msvc' or 'clang')")]
    UnknownCompiler(String),
}
