//! Diagnostics forwarded to the host.

use strata_protocol::{ChannelLog, SharedChannel};
use tracing_subscriber::EnvFilter;

use crate::error::{WorkerError, WorkerResult};

/// Install a global `tracing` subscriber whose output goes to the host as
/// `log` commands.
///
/// `filter` is an `EnvFilter` directive such as `info` or
/// `strata_pipeline=debug`.
///
/// # Errors
///
/// Returns [`WorkerError::Config`] if the directive does not parse or a
/// global subscriber is already installed.
pub fn init_logging(channel: &SharedChannel, filter: &str) -> WorkerResult<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| WorkerError::config(format!("log filter {filter:?}: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ChannelLog::new(channel.clone()))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init()
        .map_err(|e| WorkerError::config(format!("logging already initialized: {e}")))
}
