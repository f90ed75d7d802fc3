//! # Strata Segment
//!
//! Read-only views of a key/value index restricted to the entities found in
//! every one of a set of segments.
//!
//! ## Usage
//!
//! ```
//! use bytes::Bytes;
//! use strata_segment::{MemoryIndex, Segment, SegmentedView};
//!
//! let index = MemoryIndex::from_pairs([("signup", "1"), ("signup", "2"), ("signup", "3")]);
//! let segments: Vec<Segment> = vec![
//!     ["1", "2"].iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect(),
//!     ["2", "3"].iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect(),
//! ];
//!
//! let view = SegmentedView::restricted(&index, &segments).unwrap();
//! let members: Vec<Bytes> = view.lookup(b"signup").unwrap().collect();
//! assert_eq!(members, vec![Bytes::from_static(b"2")]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod memory;
mod view;

pub use error::{SegmentError, SegmentResult};
pub use index::{Index, Query, Segment, Values};
pub use memory::{IdView, MemoryIndex};
pub use view::{intersect, SegmentedView};
