//! Artifact file naming.
//!
//! Every file the pipeline produces is named after the device source's
//! base name and lives next to it in the work directory:
//!
//! ```text
//! work_dir/
//! ├── _cpyrit_cudakernel.cu        # Device source (input)
//! ├── _cpyrit_cudakernel.cubin     # Raw compiled module
//! ├── _cpyrit_cudakernel.linkinfo  # Compiler link-info byproduct
//! └── _cpyrit_cudakernel.cubin.h   # Encoded header (cache file)
//! ```

use std::path::{Path, PathBuf};

/// Deterministic locations of the pipeline's input and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Directory the compiler runs in and all artifacts are written to.
    pub work_dir: PathBuf,

    /// Device source file.
    pub source: PathBuf,

    /// Raw compiled binary.
    pub cubin: PathBuf,

    /// Link-info file emitted by the compiler.
    pub linkinfo: PathBuf,

    /// Encoded header; its existence is the cache-hit signal.
    pub header: PathBuf,
}

impl ArtifactPaths {
    /// Derive all artifact paths from a device source file.
    ///
    /// Relative `source` paths are resolved against `work_dir`, which is
    /// itself made absolute so the paths stay valid for a child process
    /// running inside it.
    pub fn new(work_dir: impl AsRef<Path>, source: impl AsRef<Path>) -> Self {
        let work_dir = work_dir.as_ref();
        let work_dir = std::path::absolute(work_dir).unwrap_or_else(|_| work_dir.to_path_buf());
        let source = work_dir.join(source.as_ref());
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            cubin: work_dir.join(format!("{}.cubin", stem)),
            linkinfo: work_dir.join(format!("{}.linkinfo", stem)),
            header: work_dir.join(format!("{}.cubin.h", stem)),
            work_dir,
            source,
        }
    }

    /// The generated files, in the order they are removed by a clean.
    pub fn generated(&self) -> [&Path; 3] {
        [&self.linkinfo, &self.cubin, &self.header]
    }
}
