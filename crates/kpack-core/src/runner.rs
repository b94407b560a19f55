//! External command execution.
//!
//! Commands are described as an explicit argument vector ([`CommandLine`])
//! and executed through the [`CommandRunner`] trait so the pipeline can be
//! driven by a fake compiler in tests.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// A program invocation: executable, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandLine {
    /// Shell-like rendering for diagnostics only; never re-parsed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code, `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Run `command` to completion and capture its output.
    ///
    /// Returns `Err` only if the process could not be started; a non-zero
    /// exit is reported through [`CommandResult::exit_code`].
    fn run(&self, command: &CommandLine) -> io::Result<CommandResult>;

    /// Run a version query, returning stdout on success and `None` on any
    /// failure.
    fn query_version(&self, command: &CommandLine) -> Option<String> {
        match self.run(command) {
            Ok(result) if result.success() => Some(result.stdout_lossy()),
            Ok(result) => {
                tracing::warn!(
                    "{}\nFailed to execute command '{}'",
                    result.stderr_lossy().trim_end(),
                    command
                );
                None
            }
            Err(e) => {
                tracing::debug!("Failed to execute command '{}': {}", command, e);
                None
            }
        }
    }

    /// Run a command whose failure must stop the build.
    fn run_checked(&self, command: &CommandLine) -> Result<CommandResult> {
        let result = self.run(command).map_err(|e| Error::CompilationFailed {
            command: command.to_string(),
            exit_code: None,
            stderr: e.to_string(),
        })?;

        if !result.success() {
            return Err(Error::CompilationFailed {
                command: command.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr_lossy(),
            });
        }

        Ok(result)
    }
}

/// Runs commands as real child processes with the inherited environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> io::Result<CommandResult> {
        tracing::debug!("Running: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        Ok(CommandResult {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
