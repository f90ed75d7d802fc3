//! Configuration for the worker channel.

/// Default ceiling for one `out` frame body: 16 MiB.
pub const DEFAULT_MAX_OUTPUT_FRAME: usize = 16 * 1024 * 1024;

/// Configuration for a [`Channel`](crate::Channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Largest body a chunked `out` frame may carry, unless a single item
    /// is larger on its own.
    pub max_output_frame: usize,
}

impl ChannelConfig {
    /// Creates a configuration with default limits.
    pub const fn new() -> Self {
        Self {
            max_output_frame: DEFAULT_MAX_OUTPUT_FRAME,
        }
    }

    /// Sets the output frame limit.
    pub const fn with_max_output_frame(mut self, bytes: usize) -> Self {
        self.max_output_frame = bytes;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}
