//! # Strata Protocol
//!
//! Framed request/reply channel between a worker and its host.
//!
//! This crate provides:
//! - Request and reply framing with nonce echo
//! - A synchronous [`Channel`] with the worker commands (`params`, `next`,
//!   `out`, `log`, ...)
//! - Size-bounded output chunking
//! - A `tracing-subscriber` writer that forwards diagnostics to the host
//!
//! The channel is strictly synchronous: one request in flight, every reply
//! read in full before the next request is written.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
pub mod frame;
mod log_writer;

pub use channel::{Channel, Entries, Reply, SharedChannel, GREETING};
pub use config::{ChannelConfig, DEFAULT_MAX_OUTPUT_FRAME};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::Command;
pub use log_writer::{ChannelLog, LogLine};
