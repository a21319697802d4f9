//! # Value Codec
//!
//! Every value is transformed before it reaches a table and reversed after it
//! is read back. The pipeline is:
//!
//! ```text
//! structured value ──serde_json──▶ text ──raw deflate──▶ bytes ──base64──▶ stored text
//! ```
//!
//! Document text skips the JSON stage. The stored payload is always plain
//! ASCII, so it never collides with SQL or delimiter syntax.
//!
//! The JSON stage is the only place type information can be lost, so the
//! caller picks the decode path: [`Codec::decode_text`] for document text,
//! [`decode_value`] for structured fields.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Reversible text transform applied to every stored value.
pub trait Codec: Send + Sync {
    fn encode_text(&self, text: &str) -> Result<String, CodecError>;
    fn decode_text(&self, stored: &str) -> Result<String, CodecError>;
}

/// Serialize a structured value and encode it.
pub fn encode_value<C, T>(codec: &C, value: &T) -> Result<String, CodecError>
where
    C: Codec + ?Sized,
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string(value)?;
    codec.encode_text(&json)
}

/// Decode a stored payload and deserialize it back into its structured shape.
pub fn decode_value<C, T>(codec: &C, stored: &str) -> Result<T, CodecError>
where
    C: Codec + ?Sized,
    T: DeserializeOwned,
{
    let json = codec.decode_text(stored)?;
    Ok(serde_json::from_str(&json)?)
}

/// Raw deflate + base64 codec.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl DeflateCodec {
    /// Levels above 9 are clamped.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Codec for DeflateCodec {
    fn encode_text(&self, text: &str) -> Result<String, CodecError> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(text.as_bytes())?;
        let compressed = encoder.finish()?;
        Ok(BASE64_STANDARD.encode(compressed))
    }

    fn decode_text(&self, stored: &str) -> Result<String, CodecError> {
        let compressed = BASE64_STANDARD.decode(stored.trim())?;
        let mut decoder = DeflateDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        Ok(String::from_utf8(raw)?)
    }
}
