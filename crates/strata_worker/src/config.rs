//! Configuration for the worker runtime.

use std::env;

use strata_codec::Codec;
use strata_log::LogConfig;
use strata_protocol::{ChannelConfig, DEFAULT_MAX_OUTPUT_FRAME};

/// Default size of one stored part of a materialized event log: 8 MiB.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Environment variable that turns on testing mode.
pub const TESTING_ENV: &str = "STRATA_TESTING";

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "STRATA_LOG";

/// Configuration for a [`Worker`](crate::Worker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Largest `out` payload before chunked output starts a new frame.
    pub max_output_frame: usize,
    /// Event logs written back larger than this are stored in parts.
    pub part_size: usize,
    /// Chunk size and codec for event logs opened from profiles.
    pub log: LogConfig,
    /// Skip the greeting exchange.
    pub testing: bool,
    /// `tracing` filter directive for forwarded diagnostics.
    pub log_filter: String,
}

impl WorkerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_output_frame: DEFAULT_MAX_OUTPUT_FRAME,
            part_size: DEFAULT_PART_SIZE,
            log: LogConfig::new(),
            testing: false,
            log_filter: "info".to_string(),
        }
    }

    /// Creates the default configuration adjusted by the environment.
    ///
    /// `STRATA_TESTING` (any value) skips the greeting and `STRATA_LOG`
    /// replaces the log filter.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.testing = env::var_os(TESTING_ENV).is_some();
        if let Ok(filter) = env::var(LOG_ENV) {
            config.log_filter = filter;
        }
        config
    }

    /// Sets the output frame limit.
    pub fn with_max_output_frame(mut self, bytes: usize) -> Self {
        self.max_output_frame = bytes;
        self
    }

    /// Sets the stored part size for event logs.
    pub fn with_part_size(mut self, bytes: usize) -> Self {
        self.part_size = bytes.max(1);
        self
    }

    /// Sets the event log chunk size, capped as [`LogConfig`] caps it.
    pub fn with_log_chunk_size(mut self, bytes: usize) -> Self {
        self.log = self.log.with_chunk_size(bytes);
        self
    }

    /// Sets the event log chunk codec.
    pub fn with_log_codec(mut self, codec: Codec) -> Self {
        self.log = self.log.with_codec(codec);
        self
    }

    /// Sets testing mode.
    pub fn with_testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    /// Sets the log filter directive.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Channel configuration derived from this one.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new().with_max_output_frame(self.max_output_frame)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}
