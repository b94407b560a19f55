//! Compression and C-header encoding of compiled modules.
//!
//! The embedded form of a module is a zlib stream rendered as an
//! `unsigned char` array literal, followed by the inflated size:
//!
//! ```c
//! unsigned char __cudakernel_packedmodule[] = {0x78,0xDA,...,
//! 0x1F,...};
//! size_t cudakernel_modulesize = 2049;
//! ```
//!
//! The size is that of the NUL-terminated module, which is what the
//! loader needs to size its inflate buffer. The compressed length is
//! implied by the number of literals.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Error, Result};

/// Literals per line in the rendered array.
pub const LITERALS_PER_LINE: usize = 32;

/// Identifiers used in the generated header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSymbols {
    /// Name of the compressed byte array
    pub array: String,

    /// Name of the inflated-size constant
    pub size: String,
}

impl Default for HeaderSymbols {
    fn default() -> Self {
        Self {
            array: "__cudakernel_packedmodule".to_string(),
            size: "cudakernel_modulesize".to_string(),
        }
    }
}

/// Raw compiler output for one build.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub raw_bytes: Vec<u8>,
    pub source_path: std::path::PathBuf,
}

/// A module ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    /// Comma-separated `0xNN` literals of the compressed module
    pub byte_literal_text: String,

    /// Length of the NUL-terminated module before compression
    pub original_length: usize,

    /// Length of the compressed stream
    pub compressed_length: usize,
}

impl EncodedArtifact {
    /// Terminate, compress and render a compiled module.
    pub fn encode(artifact: CompiledArtifact, level: u32) -> Result<Self> {
        let terminated = terminate(artifact.raw_bytes);
        let compressed = compress(&terminated, level)?;

        Ok(Self {
            byte_literal_text: render_literals(&compressed),
            original_length: terminated.len(),
            compressed_length: compressed.len(),
        })
    }

    /// Full header text declaring the array and the size constant.
    pub fn render_header(&self, symbols: &HeaderSymbols) -> String {
        format!(
            "unsigned char {}[] = {{{}}};\nsize_t {} = {};\n",
            symbols.array, self.byte_literal_text, symbols.size, self.original_length
        )
    }
}

/// Append the single NUL byte the loader expects at the end of a module.
pub fn terminate(mut raw: Vec<u8>) -> Vec<u8> {
    raw.push(0);
    raw
}

/// zlib-compress `data`. Output is deterministic for a given input and level.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(e.to_string()))
}

/// Inflate a zlib stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(inflated)
}

/// Render bytes as `0xNN` literals with a line break after every
/// [`LITERALS_PER_LINE`]th literal.
pub fn render_literals(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    // "0xNN," per byte plus one newline per line
    let mut out = String::with_capacity(bytes.len() * 5 + bytes.len() / LITERALS_PER_LINE);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(',');
            if i % LITERALS_PER_LINE == 0 {
                out.push('\n');
            }
        }
        // Writing to a String cannot fail
        let _ = write!(out, "0x{:02X}", byte);
    }
    out
}

/// Contents recovered from a generated header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    /// The compressed module
    pub compressed: Vec<u8>,

    /// Declared inflated size
    pub module_size: usize,
}

impl ParsedHeader {
    /// Inflate the module and check it against the declared size and
    /// terminator. Returns the terminated module.
    pub fn inflate(&self) -> Result<Vec<u8>> {
        let module = decompress(&self.compressed)?;
        if module.len() != self.module_size {
            return Err(Error::InvalidHeader(format!(
                "declared size {} but module inflates to {} bytes",
                self.module_size,
                module.len()
            )));
        }
        if module.last() != Some(&0) {
            return Err(Error::InvalidHeader(
                "inflated module is not NUL-terminated".to_string(),
            ));
        }
        Ok(module)
    }
}

/// Parse a header produced by [`EncodedArtifact::render_header`].
pub fn parse_header(text: &str, symbols: &HeaderSymbols) -> Result<ParsedHeader> {
    let array_decl = format!("unsigned char {}[] = {{", symbols.array);
    let body_start = text
        .find(&array_decl)
        .map(|pos| pos + array_decl.len())
        .ok_or_else(|| Error::InvalidHeader(format!("missing declaration of '{}'", symbols.array)))?;
    let body_len = text[body_start..]
        .find("};")
        .ok_or_else(|| Error::InvalidHeader(format!("unterminated array '{}'", symbols.array)))?;
    let body = &text[body_start..body_start + body_len];

    let compressed = body
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_literal)
        .collect::<Result<Vec<u8>>>()?;

    let size_decl = format!("size_t {} = ", symbols.size);
    let size_start = text
        .find(&size_decl)
        .map(|pos| pos + size_decl.len())
        .ok_or_else(|| Error::InvalidHeader(format!("missing declaration of '{}'", symbols.size)))?;
    let size_text = text[size_start..]
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    let module_size = size_text
        .parse::<usize>()
        .map_err(|_| Error::InvalidHeader(format!("bad module size '{}'", size_text)))?;

    Ok(ParsedHeader {
        compressed,
        module_size,
    })
}

fn parse_literal(token: &str) -> Result<u8> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        .ok_or_else(|| Error::InvalidHeader(format!("bad byte literal '{}'", token)))
}
