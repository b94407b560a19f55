//! Inspect command implementation for kpack CLI.

use std::fs;
use std::path::Path;

use kpack_core::{BuildConfig, parse_header};

use crate::colors;

/// Parse and inflate an existing header, reporting its sizes.
pub fn execute(dir: &Path, source: &Path) -> anyhow::Result<()> {
    let config = BuildConfig::default().with_work_dir(dir).with_source(source);
    let header_path = config.paths().header;

    if !header_path.exists() {
        anyhow::bail!(
            "No kernel header at {}; run `kpack build` first",
            header_path.display()
        );
    }

    let text = fs::read_to_string(&header_path)?;
    let parsed = parse_header(&text, &config.symbols)?;
    let module = parsed.inflate()?;

    println!("{}", colors::field(colors::GREEN, "Header", header_path.display()));
    println!(
        "{}",
        colors::field(
            colors::DIM,
            "Module",
            format_args!("{} bytes (NUL-terminated)", module.len())
        )
    );
    println!(
        "{}",
        colors::field(
            colors::DIM,
            "Compressed",
            format_args!("{} bytes", parsed.compressed.len())
        )
    );

    Ok(())
}
