//! Compiler discovery
//!
//! Looks for `cl`, `clang` and `clang++` on `PATH` and picks the flavor used to
//! synthesize compile commands.

pub mod types;

pub use types::{CompilerFlavor, CompilerType, ToolchainError};

use std::path::{Path, PathBuf};

/// Looks for an executable on `PATH`, like `which`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_executable_in(name, std::env::split_paths(&path_var))
}

fn find_executable_in<I>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let candidates: Vec<String> = if cfg!(windows) && Path::new(name).extension().is_none() {
        vec![format!("{}.exe", name), name.to_string()]
    } else {
        vec![name.to_string()]
    };

    for dir in dirs {
        for candidate in &candidates {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
        }
    }
    None
}

/// Picks a compiler flavor from what is installed.
///
/// MSVC wins when it is preferred (the default) and present. Otherwise both
/// `clang` and `clang++` are required, with MSVC as the last resort.
pub fn find_compiler(preferred: Option<CompilerType>) -> Result<CompilerFlavor, ToolchainError> {
    select_compiler(
        preferred,
        find_executable("cl"),
        find_executable("clang"),
        find_executable("clang++"),
    )
}

fn select_compiler(
    preferred: Option<CompilerType>,
    cl: Option<PathBuf>,
    clang: Option<PathBuf>,
    clangpp: Option<PathBuf>,
) -> Result<CompilerFlavor, ToolchainError> {
    let prefer_cl = preferred != Some(CompilerType::Clang);

    match (cl, clang, clangpp) {
        (Some(cl), _, _) if prefer_cl => Ok(CompilerFlavor::Msvc { cl }),
        (_, Some(clang), Some(clangpp)) => Ok(CompilerFlavor::Clang { clang, clangpp }),
        (Some(cl), _, _) => Ok(CompilerFlavor::Msvc { cl }),
        _ => Err(ToolchainError::NotFound(
            "Check your PATH variable (looked for cl, or clang and clang++).".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn p(s: &str) -> Option<PathBuf> {
        Some(PathBuf::from(s))
    }

    #[test]
    fn test_msvc_preferred_when_present() {
        let flavor = select_compiler(None, p("cl"), p("clang"), p("clang++")).unwrap();
        assert_eq!(flavor.compiler_type(), CompilerType::MSVC);
    }

    #[test]
    fn test_clang_preference_overrides_msvc() {
        let flavor =
            select_compiler(Some(CompilerType::Clang), p("cl"), p("clang"), p("clang++")).unwrap();
        assert_eq!(flavor.compiler_type(), CompilerType::Clang);
    }

    #[test]
    fn test_clang_needs_both_drivers() {
        let flavor = select_compiler(None, None, p("clang"), p("clang++")).unwrap();
        assert_eq!(flavor.cxx_path(), Path::new("clang++"));

        let err = select_compiler(None, None, p("clang"), None).unwrap_err();
        assert!(matches!(err, ToolchainError::NotFound(_)));
    }

    #[test]
    fn test_msvc_fallback_when_clang_incomplete() {
        let flavor =
            select_compiler(Some(CompilerType::Clang), p("cl"), None, p("clang++")).unwrap();
        assert_eq!(flavor, CompilerFlavor::Msvc { cl: PathBuf::from("cl") });
    }

    #[test]
    fn test_find_executable_in_searches_dirs_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "tool.exe" } else { "tool" };
        fs::write(second.path().join(name), "").unwrap();

        let found = find_executable_in(
            "tool",
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
        );
        assert_eq!(found, Some(second.path().join(name)));
        assert!(find_executable_in("missing", vec![first.path().to_path_buf()]).is_none());
    }
}
