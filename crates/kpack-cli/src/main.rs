//! kpack CLI - embeds a compiled CUDA kernel into a C header.

mod build;
mod clean;
mod colors;
mod inspect;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kpack_core::config::DEFAULT_SOURCE;

#[derive(Parser)]
#[command(name = "kpack")]
#[command(about = "Compile, compress and embed a CUDA kernel for a native extension")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Location of the kernel source and its artifacts.
#[derive(Args)]
struct ArtifactArgs {
    /// Directory holding the kernel source and generated files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Kernel source file, relative to --dir
    #[arg(short, long, default_value = DEFAULT_SOURCE)]
    source: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the kernel and write its header (skipped if the header exists)
    Build {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        /// CUDA install root to search (repeatable, replaces the defaults)
        #[arg(long = "cuda-root")]
        cuda_roots: Vec<PathBuf>,

        /// zlib compression level
        #[arg(long, default_value_t = 9, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },

    /// Remove the compiled kernel, link info and header
    Clean {
        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Verify an existing header and show its sizes
    Inspect {
        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Print the version string passed to the extension build
    Version {
        /// Checkout to read revision information from
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Attach recovery hints to kpack-core errors
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<kpack_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Build {
            artifacts,
            cuda_roots,
            level,
        } => {
            build::execute(&artifacts.dir, &artifacts.source, cuda_roots, level)
                .map_err(format_error)?;
        }

        Commands::Clean { artifacts } => {
            clean::execute(&artifacts.dir, &artifacts.source);
        }

        Commands::Inspect { artifacts } => {
            inspect::execute(&artifacts.dir, &artifacts.source).map_err(format_error)?;
        }

        Commands::Version { dir } => {
            let version = kpack_core::VersionResolver::default()
                .resolve(&kpack_core::SystemRunner, &dir);
            println!("{}", version);
        }
    }

    Ok(())
}
