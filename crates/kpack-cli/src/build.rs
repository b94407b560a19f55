//! Build command implementation for kpack CLI.
//!
//! Produces the kernel header and prints the flags the extension build
//! needs to consume it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use kpack_core::{
    ArtifactBuilder, BuildConfig, BuildOutcome, SystemRunner, ToolchainInfo, VersionResolver,
    version_define,
};

use crate::colors;

/// Build the kernel header in `dir`.
pub fn execute(dir: &Path, source: &Path, cuda_roots: Vec<PathBuf>, level: u32) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let start = Instant::now();
    let mut config = BuildConfig::from_env()
        .with_work_dir(dir)
        .with_source(source)
        .with_compression_level(level);
    if !cuda_roots.is_empty() {
        config = config.with_cuda_roots(cuda_roots);
    }

    println!(
        "\n{} - Building {}\n",
        colors::paint(colors::BOLD, "kpack"),
        colors::paint(colors::CYAN, source.display())
    );

    let toolchain = ToolchainInfo::locate(&config.cuda_roots);
    let builder = ArtifactBuilder::new(config, toolchain);

    print!("{} ... ", colors::paint(colors::BLUE, "  ◆ Building CUDA kernel"));
    colors::flush_stdout();

    match builder.build()? {
        BuildOutcome::Cached(header) => {
            println!("{} ({} exists)", colors::paint(colors::YELLOW, "skipped"), header.display());
        }
        BuildOutcome::Built(built) => {
            println!(
                "{} (nvcc {}, {} → {} bytes)",
                colors::paint(colors::GREEN, "✓"),
                built.compiler_release,
                built.encoded.original_length,
                built.encoded.compressed_length
            );
        }
    }

    // Parameters for the extension's own compile step
    let version = VersionResolver::default().resolve(&SystemRunner, dir);

    println!();
    println!(
        "{}",
        colors::field(colors::GREEN, "Header", builder.paths().header.display())
    );
    for include in &builder.toolchain().include_dirs {
        println!("{}", colors::field(colors::DIM, "Include", include.display()));
    }
    println!("{}", colors::field(colors::DIM, "Define", version_define(&version)));
    println!(
        "{}",
        colors::field(colors::DIM, "Time", format_args!("{:.2}s", start.elapsed().as_secs_f64()))
    );

    Ok(())
}
