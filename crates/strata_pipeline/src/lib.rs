//! # Strata Pipeline
//!
//! Runs several independent pipelines over one item stream, each on its own
//! thread, without buffering the stream.
//!
//! The control thread hands every item to every pipeline in turn and waits
//! until the pipeline asks for the next item before moving on. Pipelines
//! therefore see items in source order and never run at the same time as
//! one another. A pipeline that fails or panics is taken out of the
//! rotation; its siblings keep going unless
//! [`DispatchConfig::stop_on_error`] is set.
//!
//! ## Usage
//!
//! ```
//! use strata_pipeline::{run, Chain, DispatchConfig};
//!
//! let doubled = Chain::<u32>::new("doubled").map(|n| Ok(n * 2)).build();
//! let odd = Chain::<u32>::new("odd").filter(|n| n % 2 == 1).build();
//!
//! let report = run(1..=4u32, vec![doubled, odd], DispatchConfig::default());
//! assert!(report.is_success());
//! assert_eq!(report.pipelines[0].result, Ok(vec![2, 4, 6, 8]));
//! assert_eq!(report.pipelines[1].result, Ok(vec![1, 3]));
//! ```
//!
//! ## Limitations
//!
//! There is no cancellation in the middle of an item. A stage that blocks
//! forever blocks the whole dispatcher.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod config;
mod dispatcher;
mod error;
mod feed;
mod report;

pub use chain::{Chain, Classes, Counts};
pub use config::DispatchConfig;
pub use dispatcher::{run, Dispatcher, Pipeline, Stream};
pub use error::{PipelineError, PipelineResult};
pub use feed::Feed;
pub use report::{PipelineReport, RunReport};
