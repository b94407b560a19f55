//! Error types for kpack-core.

use thiserror::Error;

/// Result type for kpack-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort the artifact pipeline.
///
/// Cleanup failures and version query failures are not represented here:
/// those are recovered where they happen (see [`crate::CleanReport`] and
/// [`crate::VersionResolver`]).
#[derive(Debug, Error)]
pub enum Error {
    /// The device-code compiler could not be found or did not run.
    #[error("'{tool}' can't be found. Make sure it's available to ${env_var}")]
    ToolchainNotFound {
        tool: String,
        env_var: String,
    },

    /// The device source to compile does not exist.
    #[error("kernel source not found: {}", .0.display())]
    SourceNotFound(std::path::PathBuf),

    /// The compiler ran but exited unsuccessfully, or could not be spawned.
    #[error("failed to execute command '{command}'{}{}", exit_suffix(exit_code), stderr_suffix(stderr))]
    CompilationFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A generated header could not be parsed back.
    #[error("invalid kernel header: {0}")]
    InvalidHeader(String),

    /// Compressing or inflating the module failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    exit_code
        .map(|c| format!(" (exit code {})", c))
        .unwrap_or_default()
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(":\n{}", stderr.trim_end())
    }
}

impl Error {
    /// A short recovery suggestion to print alongside the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolchainNotFound { .. } => Some(
                "nvcc is part of the CUDA Toolkit (not the SDK); install it or set KPACK_CUDA_ROOTS",
            ),
            Self::SourceNotFound(_) => Some("pass the kernel with --source, relative to --dir"),
            Self::CompilationFailed { .. } => {
                Some("fix the kernel source and run the build again")
            }
            Self::InvalidHeader(_) => Some("run `kpack clean` to discard the cached header"),
            Self::Compression(_) | Self::Io(_) => None,
        }
    }

    /// Render the error followed by its hint, if any.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
