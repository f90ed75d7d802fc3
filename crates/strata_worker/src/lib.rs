//! # Strata Worker
//!
//! The worker side of a Strata job. A worker connects to its host over a
//! pair of byte streams, fetches the job parameters and runs one of three
//! strategy modes chosen by `params.type`:
//!
//! - `model`: map each profile to `(key, value)` postings; the postings are
//!   written out as one index.
//! - `insight`: load the indexes named by the job inputs, optionally
//!   narrowed to `params.segments`, and emit JSON widgets.
//! - `chain`: run pipelines over the profiles and emit what they produce.
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use strata_worker::{serve, Strategies, WorkerResult};
//!
//! fn main() -> WorkerResult<()> {
//!     serve(Strategies::new().model(|profile| {
//!         let uid = profile.uid_text().unwrap_or_default().to_string();
//!         Ok(profile
//!             .fields()
//!             .map(|(name, _)| (Bytes::from(name.to_string()), Bytes::from(uid.clone())))
//!             .collect())
//!     }))
//! }
//! ```
//!
//! Profile scripts that rewrite profiles use [`Worker::profile_events`]
//! directly instead of a mode.

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(unix)]
mod capture;
mod config;
mod error;
mod event;
mod logging;
mod modes;
mod profile;
mod worker;

pub use config::{WorkerConfig, DEFAULT_PART_SIZE, LOG_ENV, TESTING_ENV};
pub use error::{WorkerError, WorkerResult};
pub use event::{make_event, Event, PROFILE_DONE};
pub use logging::init_logging;
pub use modes::{ChainFn, InsightFn, Mode, Model, ModelFn, Strategies};
pub use profile::{Profile, EXPIRES_FIELD, GROUP_FORMAT, PARTS_FIELD};
pub use worker::{Events, Profiles, Worker};

/// Run a job over standard input and output.
///
/// Reads the configuration from the environment, connects, forwards
/// diagnostics to the host and runs `strategies`. On Unix, anything the
/// process prints to stdout while the job runs is sent to the host as
/// `log` lines, and `done` follows the last of them. Errors are reported
/// to the host as a diagnostic before being returned.
#[cfg(unix)]
pub fn serve(strategies: Strategies) -> WorkerResult<()> {
    let config = WorkerConfig::from_env();
    let (frames, mut capture) = capture::StdoutCapture::begin()?;
    let worker = Worker::connect(std::io::stdin(), frames, config)?;
    worker.init_logging()?;
    capture.forward(worker.channel().clone())?;

    let result = worker.run_mode(strategies);
    capture.finish()?;
    result
        .and_then(|()| worker.done())
        .inspect_err(|e| tracing::error!(error = %e, "job failed"))
}

/// Run a job over standard input and output.
///
/// Reads the configuration from the environment, connects, forwards
/// diagnostics to the host and runs `strategies`. Errors are reported to
/// the host as a diagnostic before being returned.
#[cfg(not(unix))]
pub fn serve(strategies: Strategies) -> WorkerResult<()> {
    let worker = Worker::connect(
        std::io::stdin(),
        std::io::stdout(),
        WorkerConfig::from_env(),
    )?;
    worker.init_logging()?;
    worker.run(strategies).inspect_err(|e| {
        tracing::error!(error = %e, "job failed");
    })
}
