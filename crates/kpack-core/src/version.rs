//! Best-effort version string for the extension build.
//!
//! The revision of the working copy is appended to a static base version
//! when it can be determined; otherwise the base is used as-is.

use std::path::Path;

use crate::runner::{CommandLine, CommandRunner};

/// Version reported when no revision information is available.
pub const BASE_VERSION: &str = "0.2.4-dev";

/// Derives a display version from repository metadata.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    base: String,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new(BASE_VERSION)
    }
}

impl VersionResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// The static fallback version.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Resolve the version for the checkout at `dir`.
    ///
    /// Tries `svn info`, then `git rev-parse`. Never fails; a missing tool
    /// or a directory outside a checkout is expected and only logged at
    /// debug level.
    pub fn resolve(&self, runner: &dyn CommandRunner, dir: &Path) -> String {
        let svn = CommandLine::new("svn").arg("info").current_dir(dir);
        if let Some(rev) = revision_output(runner, &svn).and_then(|out| parse_svn_revision(&out)) {
            return format!("{} (svn r{})", self.base, rev);
        }

        let git = CommandLine::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .current_dir(dir);
        if let Some(sha) = revision_output(runner, &git).and_then(|out| parse_git_sha(&out)) {
            return format!("{} (git {})", self.base, sha);
        }

        tracing::debug!("No revision information found, using {}", self.base);
        self.base.clone()
    }
}

/// Compiler define carrying the version into the extension.
pub fn version_define(version: &str) -> String {
    format!("-DVERSION=\"{}\"", version)
}

/// Run a revision query, returning stdout only on a clean exit.
fn revision_output(runner: &dyn CommandRunner, command: &CommandLine) -> Option<String> {
    match runner.run(command) {
        Ok(result) if result.success() => Some(result.stdout_lossy()),
        Ok(result) => {
            tracing::debug!(
                "'{}' exited with {:?}: {}",
                command,
                result.exit_code,
                result.stderr_lossy().trim_end()
            );
            None
        }
        Err(e) => {
            tracing::debug!("Could not run '{}': {}", command, e);
            None
        }
    }
}

/// First `Revision: N` line of `svn info` output.
fn parse_svn_revision(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Revision:"))
        .and_then(|rev| rev.trim().parse().ok())
}

fn parse_git_sha(output: &str) -> Option<String> {
    let sha = output.trim();
    let valid = !sha.is_empty() && sha.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| sha.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandResult;
    use std::io;

    /// Answers only for the named program.
    struct OnlyProgram {
        program: &'static str,
        stdout: &'static str,
    }

    impl CommandRunner for OnlyProgram {
        fn run(&self, command: &CommandLine) -> io::Result<CommandResult> {
            if command.program != Path::new(self.program) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            Ok(CommandResult {
                exit_code: Some(0),
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            })
        }
    }

    #[test]
    fn test_svn_revision() {
        let runner = OnlyProgram {
            program: "svn",
            stdout: "Path: .\nURL: http://pyrit.googlecode.com/svn/trunk\nRevision: 187\nNode Kind: directory\n",
        };
        let version = VersionResolver::default().resolve(&runner, Path::new("."));
        assert_eq!(version, "0.2.4-dev (svn r187)");
    }

    #[test]
    fn test_git_fallback() {
        let runner = OnlyProgram {
            program: "git",
            stdout: "3f9c2ab\n",
        };
        let version = VersionResolver::default().resolve(&runner, Path::new("."));
        assert_eq!(version, "0.2.4-dev (git 3f9c2ab)");
    }

    #[test]
    fn test_static_fallback() {
        let runner = OnlyProgram {
            program: "svn",
            stdout: "svn: E155007: '.' is not a working copy\n",
        };
        let version = VersionResolver::new("1.0").resolve(&runner, Path::new("."));
        assert_eq!(version, "1.0");
    }

    /// Every program fails the way git and svn do outside a checkout.
    struct NotACheckout {
        tried: std::cell::RefCell<Vec<std::path::PathBuf>>,
    }

    impl CommandRunner for NotACheckout {
        fn run(&self, command: &CommandLine) -> io::Result<CommandResult> {
            self.tried.borrow_mut().push(command.program.clone());
            Ok(CommandResult {
                exit_code: Some(128),
                stdout: Vec::new(),
                stderr: b"fatal: not a git repository".to_vec(),
            })
        }
    }

    #[test]
    fn test_non_zero_exit_falls_back() {
        let runner = NotACheckout {
            tried: std::cell::RefCell::new(Vec::new()),
        };
        let version = VersionResolver::default().resolve(&runner, Path::new("."));

        assert_eq!(version, "0.2.4-dev");
        assert_eq!(
            *runner.tried.borrow(),
            vec![std::path::PathBuf::from("svn"), std::path::PathBuf::from("git")]
        );
    }

    #[test]
    fn test_version_define() {
        assert_eq!(version_define("0.2.4-dev"), "-DVERSION=\"0.2.4-dev\"");
    }
}
