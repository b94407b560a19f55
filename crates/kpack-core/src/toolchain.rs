//! CUDA toolchain discovery.
//!
//! Locates `nvcc` and the toolkit headers from an ordered list of install
//! roots. A missing toolkit is not an error at this stage; the builder
//! reports it once it actually needs the compiler.

use std::path::{Path, PathBuf};

use crate::runner::{CommandLine, CommandRunner};

/// Name of the device-code compiler executable.
pub const NVCC: &str = "nvcc";

/// Resolved location of the CUDA toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainInfo {
    /// Install root the toolchain was found under, if any
    pub install_root: Option<PathBuf>,

    /// Compiler executable (absolute, or a bare name resolved through `PATH`)
    pub executable: PathBuf,

    /// Include directories for the extension build
    pub include_dirs: Vec<PathBuf>,
}

impl ToolchainInfo {
    /// Scan `roots` in order and use the first one that exists.
    ///
    /// When no root exists the compiler is looked up on `PATH`, falling
    /// back to the bare tool name, and a warning is logged.
    pub fn locate<P: AsRef<Path>>(roots: &[P]) -> Self {
        for root in roots {
            let root = root.as_ref();
            if root.exists() {
                tracing::debug!("Found CUDA toolkit at {}", root.display());
                return Self::from_root(root);
            }
        }

        tracing::warn!(
            "The CUDA compiler and headers required to build the kernel were not found. \
             Trying to continue anyway..."
        );

        Self {
            install_root: None,
            executable: which::which(NVCC).unwrap_or_else(|_| PathBuf::from(NVCC)),
            include_dirs: Vec::new(),
        }
    }

    /// Toolchain layout under a known install root.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            install_root: Some(root.clone()),
            executable: root.join("bin").join(NVCC),
            include_dirs: vec![root.join("include")],
        }
    }

    /// Command that asks the compiler for its version.
    pub fn version_command(&self) -> CommandLine {
        CommandLine::new(&self.executable).arg("-V")
    }

    /// Ask the compiler for its release, e.g. `"12.4, V12.4.131"`.
    ///
    /// Returns `None` if the compiler is missing or exits unsuccessfully.
    pub fn query_release(&self, runner: &dyn CommandRunner) -> Option<String> {
        runner
            .query_version(&self.version_command())
            .map(|output| parse_release(&output))
    }
}

/// Extract the release from `nvcc -V` output.
///
/// Takes everything after the last `release ` marker; output without the
/// marker is returned trimmed.
pub fn parse_release(output: &str) -> String {
    output
        .rsplit("release ")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
