//! Compression codecs for compressed documents.
//!
//! Compressed payloads carry no codec marker of their own. The codec is
//! recovered from the payload preamble:
//!
//! - zlib streams start with `0x78` followed by one of `0x01`, `0x5e`,
//!   `0x9c` or `0xda` (the four standard compression levels)
//! - LZ4 frames start with the magic number `04 22 4d 18`
//!
//! The two preambles cannot collide, and anything else is rejected.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::error::CompressionError;

const ZLIB_MAGIC: u8 = 0x78;
const ZLIB_LEVELS: [u8; 4] = [0x01, 0x5e, 0x9c, 0xda];
const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4d, 0x18];

/// Compression codec used when producing compressed documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// zlib at its fastest level.
    Zlib,
    /// LZ4 frame format.
    #[default]
    Lz4,
}

impl Codec {
    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Zlib => "zlib",
            Codec::Lz4 => "lz4",
        }
    }

    /// Detect the codec that produced `payload` from its preamble.
    pub fn detect(payload: &[u8]) -> Option<Codec> {
        match payload {
            [ZLIB_MAGIC, level, ..] if ZLIB_LEVELS.contains(level) => Some(Codec::Zlib),
            [a, b, c, d, ..] if [*a, *b, *c, *d] == LZ4_FRAME_MAGIC => Some(Codec::Lz4),
            _ => None,
        }
    }
}

/// Compress `input` with the given codec.
///
/// # Errors
///
/// Returns an error if the codec fails to produce output.
pub fn compress(codec: Codec, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
    match codec {
        Codec::Zlib => {
            let mut enc = ZlibEncoder::new(Vec::with_capacity(input.len() / 2), Compression::fast());
            enc.write_all(input)
                .map_err(|e| CompressionError::codec_failed("zlib", e.to_string()))?;
            enc.finish()
                .map_err(|e| CompressionError::codec_failed("zlib", e.to_string()))
        }
        Codec::Lz4 => {
            let mut enc = FrameEncoder::new(Vec::with_capacity(input.len() / 2));
            enc.write_all(input)
                .map_err(|e| CompressionError::codec_failed("lz4", e.to_string()))?;
            enc.finish()
                .map_err(|e| CompressionError::codec_failed("lz4", e.to_string()))
        }
    }
}

/// Decompress a payload, selecting the codec by preamble inspection.
///
/// # Errors
///
/// Returns [`CompressionError::UnknownPreamble`] if the payload matches no
/// known codec, or a codec failure if the stream is corrupt.
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let codec = Codec::detect(payload).ok_or_else(|| CompressionError::UnknownPreamble {
        preamble: payload.iter().take(4).copied().collect(),
    })?;

    let mut out = Vec::with_capacity(payload.len() * 2);
    let result = match codec {
        Codec::Zlib => ZlibDecoder::new(payload).read_to_end(&mut out),
        Codec::Lz4 => FrameDecoder::new(payload).read_to_end(&mut out),
    };
    result.map_err(|e| CompressionError::codec_failed(codec.name(), e.to_string()))?;
    Ok(out)
}
