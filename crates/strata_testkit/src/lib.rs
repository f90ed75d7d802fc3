//! # Strata Testkit
//!
//! Test utilities for Strata.
//!
//! This crate provides:
//! - [`ScriptedHost`], an in-memory host that answers worker requests and
//!   records them
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```
//! use strata_codec::Value;
//! use strata_protocol::ChannelConfig;
//! use strata_testkit::ScriptedHost;
//!
//! let host = ScriptedHost::new();
//! let mut channel = host.channel(ChannelConfig::default());
//! channel.output(vec![Value::Integer(1)], false).unwrap();
//! assert_eq!(host.outputs(), vec![Value::Integer(1)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
