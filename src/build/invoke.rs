//! Launching a command through a response file.
//!
//! Arguments are written to `<scratch>/args/args*`, and the program is started
//! with a single `@file` argument instead, so huge include lists never hit the
//! OS command-line limit. Output goes to a private log file under
//! `<log>/standalone/` unless running verbosely.

use super::compile_db::CompileCommand;
use crate::toolchain::CompilerFlavor;
use anyhow::{Result, anyhow};
use colored::*;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

/// A command line split into the program (plus fixed leading arguments) and
/// the arguments that go into the response file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandWithResponse {
    pub command: Vec<String>,
    pub args: Vec<String>,
}

impl CommandWithResponse {
    pub fn new(mut arguments: Vec<String>) -> Self {
        let args = if arguments.len() > 1 {
            arguments.split_off(1)
        } else {
            Vec::new()
        };
        Self {
            command: arguments,
            args,
        }
    }

    pub fn from_compile_command(cc: &CompileCommand) -> Result<Self> {
        Ok(Self::new(cc.arguments()?))
    }

    /// Runs `extractor --mimic <compiler>` instead of the compiler itself.
    pub fn mimicked_by(mut self, extractor: &Path) -> Self {
        let mut command = vec![
            extractor.to_string_lossy().to_string(),
            "--mimic".to_string(),
        ];
        command.append(&mut self.command);
        self.command = command;
        self
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("<empty>")
    }
}

/// Where invocations keep their response files and logs.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub scratch_dir: PathBuf,
    /// Unused in verbose mode.
    pub log_dir: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Ran but exited non-zero; `None` when terminated by a signal.
    Partial(Option<i32>),
    /// Could not be started at all.
    LaunchFailure(String),
}

impl Outcome {
    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => Outcome::Success,
            code => Outcome::Partial(code),
        }
    }
}

/// Log location for one attempt: `standalone/XX/YY/ZZZZZ.log` from a hash of
/// the start time, the process id and the attempt number.
pub fn log_file_path(log_dir: &Path, time_ns: u128, pid: u32, attempt: u64) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    (time_ns, pid, attempt).hash(&mut hasher);
    let h = hasher.finish();
    log_dir
        .join("standalone")
        .join(format!("{:02x}", h & 0x3f))
        .join(format!("{:02x}", (h >> 6) & 0x3f))
        .join(format!("{:05x}.log", h >> 12))
}

/// Creates a fresh log file, moving on to the next attempt number on collision.
pub fn create_log_file(log_dir: &Path) -> io::Result<(File, PathBuf)> {
    let time_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let pid = std::process::id();

    let mut attempt = 0u64;
    loop {
        attempt += 1;
        let path = log_file_path(log_dir, time_ns, pid, attempt);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Writes the response file and returns its path. The file is kept on disk.
pub fn write_response_file(
    scratch_dir: &Path,
    args: &[String],
    compiler: &CompilerFlavor,
) -> io::Result<PathBuf> {
    let args_dir = scratch_dir.join("args");
    fs::create_dir_all(&args_dir)?;
    let temp = tempfile::Builder::new()
        .prefix("args")
        .tempfile_in(&args_dir)?;
    let (file, path) = temp.keep()?;

    let mut writer = BufWriter::new(file);
    compiler.write_response_file(&mut writer, args)?;
    writer.flush()?;
    Ok(path)
}

fn launch(
    command: &CommandWithResponse,
    compiler: &CompilerFlavor,
    ctx: &InvocationContext,
) -> io::Result<ExitStatus> {
    let Some((program, fixed_args)) = command.command.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };

    let response_file = write_response_file(&ctx.scratch_dir, &command.args, compiler)?;
    let response_arg = format!("@{}", response_file.display());

    let mut cmd = Command::new(program);
    cmd.args(fixed_args).arg(&response_arg);

    // Held until the child has exited; dropping it closes the log on every path.
    let _log: Option<File> = if ctx.verbose {
        println!("Running: {} {}", command.command.join(" "), response_arg);
        None
    } else {
        let log_dir = ctx
            .log_dir
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "log directory is not set"))?;
        let (log, _) = create_log_file(log_dir)?;
        cmd.stdout(Stdio::from(log.try_clone()?));
        cmd.stderr(Stdio::from(log.try_clone()?));
        Some(log)
    };

    let mut child = cmd.spawn()?;
    child.wait()
}

/// Runs one command through a response file and classifies the result.
pub fn run_process_with_response_file(
    command: &CommandWithResponse,
    compiler: &CompilerFlavor,
    ctx: &InvocationContext,
) -> Outcome {
    match launch(command, compiler, ctx) {
        Ok(status) => Outcome::from_status(status),
        Err(e) => Outcome::LaunchFailure(format!(
            "Failed to launch {} because {}",
            command.program(),
            e
        )),
    }
}

/// Builds the invocation list for a command file.
pub fn invocations(
    commands: &[CompileCommand],
    extractor: Option<&Path>,
) -> Result<Vec<CommandWithResponse>> {
    commands
        .iter()
        .map(|cc| {
            let invocation = CommandWithResponse::from_compile_command(cc)?;
            if invocation.command.is_empty() {
                return Err(anyhow!("Empty command for {}", cc.file));
            }
            Ok(match extractor {
                Some(extractor) => invocation.mimicked_by(extractor),
                None => invocation,
            })
        })
        .collect()
}

pub(crate) fn describe(outcome: &Outcome, command: &CommandWithResponse) -> Option<String> {
    match outcome {
        Outcome::Success => None,
        Outcome::Partial(Some(code)) => Some(format!(
            "{} {} exited with code {}",
            "!".yellow(),
            command.program(),
            code
        )),
        Outcome::Partial(None) => Some(format!(
            "{} {} was terminated by a signal",
            "!".yellow(),
            command.program()
        )),
        Outcome::LaunchFailure(msg) => Some(format!("{} {}", "x".red(), msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msvc() -> CompilerFlavor {
        CompilerFlavor::Msvc {
            cl: PathBuf::from("cl"),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_and_mimic() {
        let cmd = CommandWithResponse::new(strings(&["cl", "/Zs", "a.c"]));
        assert_eq!(cmd.command, strings(&["cl"]));
        assert_eq!(cmd.args, strings(&["/Zs", "a.c"]));

        let wrapped = cmd.mimicked_by(Path::new("/tools/extractor"));
        assert_eq!(wrapped.command, strings(&["/tools/extractor", "--mimic", "cl"]));
        assert_eq!(wrapped.args, strings(&["/Zs", "a.c"]));
    }

    #[test]
    fn test_invocations_reject_empty_commands() {
        let cc = CompileCommand {
            directory: ".".to_string(),
            command: String::new(),
            output: "a.o".to_string(),
            file: "a.c".to_string(),
        };
        assert!(invocations(&[cc], None).is_err());
    }

    #[test]
    fn test_log_paths_are_sharded_and_differ_per_attempt() {
        let a = log_file_path(Path::new("/logs"), 1, 2, 1);
        let b = log_file_path(Path::new("/logs"), 1, 2, 2);
        assert_ne!(a, b);
        assert_eq!(a, log_file_path(Path::new("/logs"), 1, 2, 1));

        let rel = a.strip_prefix("/logs/standalone").unwrap();
        let parts: Vec<_> = rel.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
        assert!(parts[2].ends_with(".log"));
    }

    #[test]
    fn test_create_log_file_never_reuses_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_f1, p1) = create_log_file(dir.path()).unwrap();
        let (_f2, p2) = create_log_file(dir.path()).unwrap();
        assert_ne!(p1, p2);
        assert!(p1.starts_with(dir.path().join("standalone")));
    }

    #[test]
    fn test_response_file_lands_in_scratch_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_response_file(dir.path(), &strings(&["/I", "a b/c"]), &msvc()).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join("args"));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("args"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "/I\na b/c\n");
    }

    #[test]
    fn test_missing_program_is_a_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = InvocationContext {
            scratch_dir: dir.path().to_path_buf(),
            log_dir: Some(dir.path().join("log")),
            verbose: false,
        };
        let cmd = CommandWithResponse::new(strings(&["/definitely/not/a/compiler", "x.c"]));
        let outcome = run_process_with_response_file(&cmd, &msvc(), &ctx);
        assert!(matches!(outcome, Outcome::LaunchFailure(ref m) if m.contains("/definitely/not/a/compiler")));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_codes_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = InvocationContext {
            scratch_dir: dir.path().to_path_buf(),
            log_dir: Some(dir.path().join("log")),
            verbose: false,
        };
        let ok = CommandWithResponse::new(strings(&["true", "x"]));
        let bad = CommandWithResponse::new(strings(&["false", "x"]));
        assert_eq!(run_process_with_response_file(&ok, &msvc(), &ctx), Outcome::Success);
        assert_eq!(
            run_process_with_response_file(&bad, &msvc(), &ctx),
            Outcome::Partial(Some(1))
        );
        assert!(dir.path().join("log").join("standalone").is_dir());
    }
}
