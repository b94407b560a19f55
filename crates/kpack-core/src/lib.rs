//! Artifact pipeline for embedding a compiled CUDA kernel into a native
//! extension.
//!
//! This crate provides:
//! - Toolchain discovery (`nvcc` and the toolkit headers)
//! - External command execution behind a mockable runner
//! - The kernel builder: compile, NUL-terminate, zlib, C header
//! - Header parsing and verification
//! - Cleanup of generated artifacts
//! - Best-effort version resolution for the extension build

pub mod builder;
pub mod cleaner;
pub mod config;
pub mod encode;
pub mod error;
pub mod paths;
pub mod runner;
pub mod toolchain;
pub mod version;

pub use builder::{ArtifactBuilder, BuildOutcome, BuiltArtifact};
pub use cleaner::{ArtifactCleaner, CleanReport};
pub use config::BuildConfig;
pub use encode::{CompiledArtifact, EncodedArtifact, HeaderSymbols, ParsedHeader, parse_header};
pub use error::{Error, Result};
pub use paths::ArtifactPaths;
pub use runner::{CommandLine, CommandResult, CommandRunner, SystemRunner};
pub use toolchain::ToolchainInfo;
pub use version::{VersionResolver, version_define};
