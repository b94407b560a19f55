//! Build configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::encode::HeaderSymbols;
use crate::paths::ArtifactPaths;

/// Install roots searched for the CUDA toolkit, in order.
pub const DEFAULT_CUDA_ROOTS: [&str; 2] = ["/usr/local/cuda", "/opt/cuda"];

/// Device source compiled when none is given.
pub const DEFAULT_SOURCE: &str = "_cpyrit_cudakernel.cu";

/// Environment variable that replaces [`DEFAULT_CUDA_ROOTS`].
///
/// Uses the platform's path-list syntax (`:` on Unix, `;` on Windows).
pub const CUDA_ROOTS_ENV: &str = "KPACK_CUDA_ROOTS";

/// zlib level used for the embedded module.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing the device source and receiving all artifacts
    pub work_dir: PathBuf,

    /// Device source file, relative to `work_dir`
    pub source: PathBuf,

    /// Candidate toolkit install roots, first existing one wins
    pub cuda_roots: Vec<PathBuf>,

    /// zlib compression level (0-9)
    pub compression_level: u32,

    /// Identifiers written into the generated header
    pub symbols: HeaderSymbols,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            source: PathBuf::from(DEFAULT_SOURCE),
            cuda_roots: DEFAULT_CUDA_ROOTS.iter().map(PathBuf::from).collect(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            symbols: HeaderSymbols::default(),
        }
    }
}

impl BuildConfig {
    /// Default configuration with `KPACK_CUDA_ROOTS` applied, if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(roots) = roots_from_env_value(std::env::var_os(CUDA_ROOTS_ENV)) {
            tracing::debug!("Using CUDA roots from {}: {:?}", CUDA_ROOTS_ENV, roots);
            config.cuda_roots = roots;
        }
        config
    }

    /// Set the work directory.
    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the device source file.
    pub fn with_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = source.as_ref().to_path_buf();
        self
    }

    /// Replace the candidate install roots.
    pub fn with_cuda_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.cuda_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Set the compression level, clamped to 0-9.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Paths of the source and every generated artifact.
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.work_dir, &self.source)
    }
}

/// Split a `KPACK_CUDA_ROOTS` value into roots.
///
/// Unset or blank values yield `None` so the defaults stay in effect.
fn roots_from_env_value(value: Option<OsString>) -> Option<Vec<PathBuf>> {
    let value = value?;
    let roots: Vec<PathBuf> = std::env::split_paths(&value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    if roots.is_empty() { None } else { Some(roots) }
}
