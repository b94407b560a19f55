//! Removal of generated kernel artifacts.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::paths::ArtifactPaths;

/// What happened to each generated file during a clean.
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Files that were removed
    pub removed: Vec<PathBuf>,

    /// Files that did not exist
    pub missing: Vec<PathBuf>,

    /// Directories sitting at an artifact path that could not be removed
    pub skipped_dirs: Vec<PathBuf>,

    /// Unexpected failures, logged and otherwise ignored
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl CleanReport {
    /// True if nothing unexpected happened.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes the cubin, link-info and header files.
pub struct ArtifactCleaner {
    paths: ArtifactPaths,
}

impl ArtifactCleaner {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    /// Remove every generated file, tolerating any that are absent.
    ///
    /// Never fails: each file is handled independently and errors are
    /// logged and recorded in the report.
    pub fn clean(&self) -> CleanReport {
        tracing::info!("Removing temporary files and pre-built GPU-kernels...");

        let mut report = CleanReport::default();
        for path in self.paths.generated() {
            let path = path.to_path_buf();
            if path.is_dir() {
                // An empty directory in the way is removed, anything else is left alone.
                match fs::remove_dir(&path) {
                    Ok(()) => report.removed.push(path),
                    Err(e) => {
                        tracing::debug!("Leaving directory {} in place: {}", path.display(), e);
                        report.skipped_dirs.push(path);
                    }
                }
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed {}", path.display());
                    report.removed.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing.push(path),
                Err(e) => {
                    tracing::warn!("Exception while cleaning temporary file {}: {}", path.display(), e);
                    report.failed.push((path, e));
                }
            }
        }

        report
    }
}
