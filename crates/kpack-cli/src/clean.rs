//! Clean command implementation for kpack CLI.

use std::path::Path;

use kpack_core::{ArtifactCleaner, BuildConfig};

use crate::colors;

/// Remove generated kernel artifacts. Problems are reported, never fatal.
pub fn execute(dir: &Path, source: &Path) {
    let paths = BuildConfig::default()
        .with_work_dir(dir)
        .with_source(source)
        .paths();

    let report = ArtifactCleaner::new(paths).clean();

    for path in &report.removed {
        println!("{} {}", colors::paint(colors::GREEN, "removed"), path.display());
    }
    for path in &report.skipped_dirs {
        println!(
            "{} {} (directory)",
            colors::paint(colors::YELLOW, "skipped"),
            path.display()
        );
    }
    for (path, err) in &report.failed {
        eprintln!("Exception while cleaning temporary file {}: {}", path.display(), err);
    }
    if !report.is_clean() {
        eprintln!("{} file(s) could not be removed", report.failed.len());
    } else if report.removed.is_empty() {
        println!("{}", colors::paint(colors::DIM, "Nothing to clean"));
    }
}
