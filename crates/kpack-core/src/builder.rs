//! Kernel header builder.
//!
//! Produces the embeddable header for a device source file, or reuses the
//! one already on disk:
//!
//! ```text
//! header exists? ──yes──► Cached
//!       │ no
//!       ▼
//! nvcc -V ──► nvcc --cubin ──► read + NUL ──► zlib ──► 0xNN literals ──► write header
//! ```
//!
//! The cached header is never compared against the source. Editing the
//! kernel after a successful build has no effect until the artifacts are
//! cleaned. Two builds running concurrently in the same directory race on
//! the header file; that is not guarded against.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::encode::{CompiledArtifact, EncodedArtifact};
use crate::error::{Error, Result};
use crate::paths::ArtifactPaths;
use crate::runner::{CommandLine, CommandRunner, SystemRunner};
use crate::toolchain::{NVCC, ToolchainInfo};

/// Flags passed to nvcc ahead of the source file.
pub const NVCC_FLAGS: [&str; 7] = [
    "--host-compilation",
    "C",
    "-Xptxas",
    "-v",
    "-Xcompiler",
    "-fPIC",
    "--cubin",
];

/// A header produced by this invocation.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    /// Path of the written header
    pub header_path: PathBuf,

    /// Compiler release reported by `nvcc -V`
    pub compiler_release: String,

    /// The encoded module
    pub encoded: EncodedArtifact,
}

/// Result of a build request.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The header was already present; nothing ran.
    Cached(PathBuf),

    /// The kernel was compiled and a new header written.
    Built(BuiltArtifact),
}

impl BuildOutcome {
    /// Path of the header, whether cached or fresh.
    pub fn header_path(&self) -> &PathBuf {
        match self {
            Self::Cached(path) => path,
            Self::Built(built) => &built.header_path,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Compiles a device source and encodes it into a C header.
pub struct ArtifactBuilder<R: CommandRunner = SystemRunner> {
    /// Build configuration
    config: BuildConfig,

    /// Resolved toolchain
    toolchain: ToolchainInfo,

    /// Executes nvcc
    runner: R,

    /// Artifact locations derived from the config
    paths: ArtifactPaths,
}

impl ArtifactBuilder<SystemRunner> {
    /// Create a builder that runs the real compiler.
    pub fn new(config: BuildConfig, toolchain: ToolchainInfo) -> Self {
        Self::with_runner(config, toolchain, SystemRunner)
    }
}

impl<R: CommandRunner> ArtifactBuilder<R> {
    /// Create a builder with a custom command runner.
    pub fn with_runner(config: BuildConfig, toolchain: ToolchainInfo, runner: R) -> Self {
        let paths = config.paths();
        Self {
            config,
            toolchain,
            runner,
            paths,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn toolchain(&self) -> &ToolchainInfo {
        &self.toolchain
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Whether a header already exists. Its content is not inspected.
    pub fn is_cached(&self) -> bool {
        self.paths.header.exists()
    }

    /// Produce the header, or reuse the existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - nvcc is missing or does not answer `-V` ([`Error::ToolchainNotFound`])
    /// - the device source is missing ([`Error::SourceNotFound`])
    /// - nvcc exits unsuccessfully ([`Error::CompilationFailed`])
    /// - the compiled module cannot be read or the header cannot be written
    ///
    /// No header is written unless every earlier step succeeded, and the
    /// header only appears once it is complete.
    pub fn build(&self) -> Result<BuildOutcome> {
        if self.is_cached() {
            tracing::info!(
                "Skipping rebuild of CUDA kernel, {} exists",
                self.paths.header.display()
            );
            return Ok(BuildOutcome::Cached(self.paths.header.clone()));
        }

        let compiler_release = self.verify_toolchain()?;
        tracing::info!("Compiling CUDA module using nvcc {}...", compiler_release);

        if !self.paths.source.exists() {
            return Err(Error::SourceNotFound(self.paths.source.clone()));
        }

        let compiled = self.compile()?;
        tracing::debug!("Encoding module compiled from {}", compiled.source_path.display());
        let encoded = EncodedArtifact::encode(compiled, self.config.compression_level)?;
        tracing::debug!(
            "Encoded {} byte module into {} compressed bytes",
            encoded.original_length,
            encoded.compressed_length
        );

        let header = encoded.render_header(&self.config.symbols);
        write_atomically(&self.paths.header, |file| file.write_all(header.as_bytes()))?;
        tracing::info!("Wrote {}", self.paths.header.display());

        Ok(BuildOutcome::Built(BuiltArtifact {
            header_path: self.paths.header.clone(),
            compiler_release,
            encoded,
        }))
    }

    /// Check that nvcc runs and return its release.
    pub fn verify_toolchain(&self) -> Result<String> {
        self.toolchain
            .query_release(&self.runner)
            .ok_or_else(|| Error::ToolchainNotFound {
                tool: NVCC.to_string(),
                env_var: "PATH".to_string(),
            })
    }

    /// The nvcc invocation that compiles the source into a cubin.
    pub fn compile_command(&self) -> CommandLine {
        CommandLine::new(&self.toolchain.executable)
            .args(NVCC_FLAGS)
            .arg(&self.paths.source)
            .arg("-o")
            .arg(&self.paths.cubin)
            .current_dir(&self.paths.work_dir)
    }

    /// Run nvcc and read the module it produced.
    pub fn compile(&self) -> Result<CompiledArtifact> {
        self.runner.run_checked(&self.compile_command())?;
        let raw_bytes = fs::read(&self.paths.cubin)?;
        tracing::debug!(
            "Read {} bytes from {}",
            raw_bytes.len(),
            self.paths.cubin.display()
        );

        Ok(CompiledArtifact {
            raw_bytes,
            source_path: self.paths.source.clone(),
        })
    }
}

/// Write `dest` through a sibling temp file that is renamed into place.
///
/// A failed or interrupted write never leaves a partial file at `dest`;
/// the temp file is removed when `fill` or the rename fails.
fn write_atomically<F>(dest: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let dir = dest.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".kpack-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{HeaderSymbols, parse_header};
    use std::cell::RefCell;
    use std::io;
    use tempfile::TempDir;

    use crate::runner::CommandResult;

    /// Stands in for nvcc: answers `-V` and writes a module to the `-o` path.
    struct FakeNvcc {
        installed: bool,
        module: Vec<u8>,
        compile_exit: i32,
        calls: RefCell<Vec<CommandLine>>,
    }

    impl FakeNvcc {
        fn new(module: Vec<u8>) -> Self {
            Self {
                installed: true,
                module,
                compile_exit: 0,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn compilations(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.args.iter().any(|a| a == "--cubin"))
                .count()
        }
    }

    impl CommandRunner for FakeNvcc {
        fn run(&self, command: &CommandLine) -> io::Result<CommandResult> {
            self.calls.borrow_mut().push(command.clone());
            if !self.installed {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }

            if command.args.iter().any(|a| a == "-V") {
                return Ok(CommandResult {
                    exit_code: Some(0),
                    stdout: b"Cuda compilation tools, release 12.4, V12.4.131\n".to_vec(),
                    stderr: Vec::new(),
                });
            }

            if self.compile_exit != 0 {
                return Ok(CommandResult {
                    exit_code: Some(self.compile_exit),
                    stdout: Vec::new(),
                    stderr: b"kernel.cu(7): error: identifier \"x\" is undefined".to_vec(),
                });
            }

            let out = command
                .args
                .iter()
                .position(|a| a == "-o")
                .and_then(|i| command.args.get(i + 1))
                .expect("compile command has -o");
            std::fs::write(out, &self.module)?;
            Ok(CommandResult {
                exit_code: Some(0),
                ..Default::default()
            })
        }
    }

    fn setup() -> (TempDir, BuildConfig) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join("kernel.cu"), "__global__ void k() {}").unwrap();
        let config = BuildConfig::default()
            .with_work_dir(temp.path())
            .with_source("kernel.cu");
        (temp, config)
    }

    fn toolchain() -> ToolchainInfo {
        ToolchainInfo::from_root("/usr/local/cuda")
    }

    #[test]
    fn test_build_writes_header() {
        let (_temp, config) = setup();
        let module: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();
        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(module.clone()));

        let outcome = builder.build().expect("build should succeed");
        let BuildOutcome::Built(built) = outcome else {
            panic!("expected a fresh build");
        };
        assert_eq!(built.compiler_release, "12.4, V12.4.131");
        assert_eq!(built.encoded.original_length, 2049);

        let header = std::fs::read_to_string(&built.header_path).unwrap();
        assert!(header.contains("size_t cudakernel_modulesize = 2049;"));

        let inflated = parse_header(&header, &HeaderSymbols::default())
            .unwrap()
            .inflate()
            .unwrap();
        assert_eq!(&inflated[..2048], module.as_slice());
        assert_eq!(inflated[2048], 0);
    }

    #[test]
    fn test_second_build_is_cache_hit() {
        let (_temp, config) = setup();
        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(vec![1; 64]));

        assert!(!builder.build().unwrap().is_cached());
        let second = builder.build().unwrap();

        assert!(second.is_cached());
        assert_eq!(second.header_path(), &builder.paths().header);
        assert_eq!(builder.runner.compilations(), 1);
    }

    #[test]
    fn test_stale_header_is_reused() {
        let (temp, config) = setup();
        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(vec![1; 64]));
        builder.build().unwrap();
        let before = std::fs::read(&builder.paths().header).unwrap();

        std::fs::write(temp.path().join("kernel.cu"), "__global__ void changed() {}").unwrap();

        assert!(builder.build().unwrap().is_cached());
        assert_eq!(std::fs::read(&builder.paths().header).unwrap(), before);
    }

    #[test]
    fn test_missing_toolchain_is_fatal() {
        let (_temp, config) = setup();
        let mut nvcc = FakeNvcc::new(vec![1; 64]);
        nvcc.installed = false;
        let builder = ArtifactBuilder::with_runner(config, toolchain(), nvcc);

        let err = builder.build().unwrap_err();
        assert!(matches!(&err, Error::ToolchainNotFound { tool, .. } if tool == "nvcc"));
        assert!(!builder.paths().header.exists());
        assert_eq!(builder.runner.compilations(), 0);
    }

    #[test]
    fn test_compile_failure_leaves_no_header() {
        let (_temp, config) = setup();
        let mut nvcc = FakeNvcc::new(vec![1; 64]);
        nvcc.compile_exit = 2;
        let builder = ArtifactBuilder::with_runner(config, toolchain(), nvcc);

        let err = builder.build().unwrap_err();
        match err {
            Error::CompilationFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(2));
                assert!(stderr.contains("is undefined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!builder.paths().header.exists());
    }

    fn stray_temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_interrupted_header_write_leaves_nothing() {
        let (temp, config) = setup();
        let header = config.paths().header;

        let err = write_atomically(&header, |file| {
            file.write_all(b"unsigned char __cudakernel_packedmodule[] = {0x78,0x")?;
            Err(io::Error::other("File too large"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "File too large");
        assert!(!header.exists());
        assert!(stray_temp_files(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_rename_cleans_up_temp_file() {
        let (temp, config) = setup();
        let header = config.paths().header;
        std::fs::create_dir(&header).unwrap();
        std::fs::write(header.join("occupied"), b"x").unwrap();

        assert!(write_atomically(&header, |file| file.write_all(b"text")).is_err());
        assert!(header.is_dir());
        assert!(stray_temp_files(temp.path()).is_empty());
    }

    #[test]
    fn test_successful_build_leaves_no_temp_file() {
        let (temp, config) = setup();
        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(vec![3; 128]));

        builder.build().unwrap();

        assert!(builder.paths().header.is_file());
        assert!(stray_temp_files(temp.path()).is_empty());
    }

    #[test]
    fn test_toolchain_checked_before_source() {
        let (temp, config) = setup();
        std::fs::remove_file(temp.path().join("kernel.cu")).unwrap();

        let mut nvcc = FakeNvcc::new(vec![1; 64]);
        nvcc.installed = false;
        let builder = ArtifactBuilder::with_runner(config.clone(), toolchain(), nvcc);
        assert!(matches!(builder.build(), Err(Error::ToolchainNotFound { .. })));

        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(vec![1; 64]));
        let err = builder.build().unwrap_err();
        assert!(matches!(&err, Error::SourceNotFound(path) if path.ends_with("kernel.cu")));
        assert_eq!(builder.runner.compilations(), 0);
    }

    #[test]
    fn test_compile_command_flags() {
        let (temp, config) = setup();
        let builder = ArtifactBuilder::with_runner(config, toolchain(), FakeNvcc::new(Vec::new()));
        let cmd = builder.compile_command();

        assert_eq!(cmd.program, PathBuf::from("/usr/local/cuda/bin/nvcc"));
        let args: Vec<String> = cmd.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..7], &NVCC_FLAGS);
        assert!(args[7].ends_with("kernel.cu"));
        assert_eq!(args[8], "-o");
        assert!(args[9].ends_with("kernel.cubin"));
        assert_eq!(cmd.current_dir.as_deref(), Some(temp.path()));
    }
}
