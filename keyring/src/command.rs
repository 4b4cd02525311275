//! Local command execution

use crate::error::{KeyringError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, -1 when the process was terminated by a signal
    pub retcode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.retcode == 0
    }
}

/// Runs a command synchronously and captures its output.
///
/// `argv[0]` is the program, the rest are its arguments.
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Runs commands on the local host, blocking until they exit
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCommandRunner;

impl CommandRunner for LocalCommandRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| KeyringError::Process("empty command line".into()))?;

        debug!("Executing {}", program);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| KeyringError::Process(format!("Failed to execute {}: {}", program, e)))?;

        let result = CommandOutput {
            retcode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        trace!("{} exited with {}", program, result.retcode);
        Ok(result)
    }
}

/// Join a command line for diagnostics
pub fn display_command(argv: &[String]) -> String {
    argv.join(" ")
}

/// Like [`display_command`] but hides the value following `--add-key`
pub fn display_masked(argv: &[String]) -> String {
    let mut masked = Vec::with_capacity(argv.len());
    let mut hide_next = false;

    for arg in argv {
        if hide_next {
            masked.push("<secret>");
            hide_next = false;
        } else {
            hide_next = arg == "--add-key";
            masked.push(arg.as_str());
        }
    }

    masked.join(" ")
}

/// Locate a tool, preferring an explicitly configured path over `PATH`
pub fn find_tool(explicit: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(KeyringError::ToolNotFound(format!(
            "{} (configured as {})",
            name,
            path.display()
        )));
    }

    which::which(name).map_err(|_| KeyringError::ToolNotFound(name.to_string()))
}
