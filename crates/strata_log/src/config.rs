//! Configuration for the chunked log.

use strata_codec::Codec;

/// Largest head size, in encoded bytes, before it is sealed: 64 KiB.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for a [`ChunkedLog`](crate::ChunkedLog).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    chunk_size: usize,
    /// Codec used for sealed chunks.
    pub codec: Codec,
}

impl LogConfig {
    /// Creates a configuration with the largest chunk size and LZ4 chunks.
    pub const fn new() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            codec: Codec::Lz4,
        }
    }

    /// Sets the chunk size, capped at [`MAX_CHUNK_SIZE`].
    pub const fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = if bytes < MAX_CHUNK_SIZE {
            bytes
        } else {
            MAX_CHUNK_SIZE
        };
        self
    }

    /// Sets the chunk codec.
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Head size above which the head is sealed into a chunk.
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_capped() {
        assert_eq!(LogConfig::new().chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(LogConfig::new().with_chunk_size(14).chunk_size(), 14);
        assert_eq!(
            LogConfig::new().with_chunk_size(1 << 20).chunk_size(),
            MAX_CHUNK_SIZE
        );
    }
}
