//! # Strata Log
//!
//! Append-only event log for long-lived profiles.
//!
//! The log keeps recent items in a small uncompressed head and seals older
//! items into compressed chunks. Iteration is newest first, and chunks are
//! only decompressed when iteration reaches them, so reading the latest
//! events of a large log stays cheap.
//!
//! ## Usage
//!
//! ```
//! use strata_log::{ChunkedLog, LogConfig};
//! use strata_codec::Value;
//!
//! let mut log = ChunkedLog::new(LogConfig::new().with_chunk_size(16));
//! log.push(vec![Value::bytes("a"), Value::bytes("b")]).unwrap();
//! log.push(vec![Value::bytes("c")]).unwrap();
//!
//! let newest: Vec<Value> = log.iter().map(Result::unwrap).collect();
//! assert_eq!(newest, vec![Value::bytes("c"), Value::bytes("b"), Value::bytes("a")]);
//!
//! let encoded = log.encode();
//! assert!(log.push(vec![Value::bytes("d")]).is_err());
//! let reopened = ChunkedLog::from_encoded(encoded, LogConfig::default()).unwrap();
//! assert_eq!(reopened.iter().count(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunked;
mod config;
mod error;

pub use chunked::{ChunkedLog, LogIter, LogState};
pub use config::{LogConfig, MAX_CHUNK_SIZE};
pub use error::{LogError, LogResult};
