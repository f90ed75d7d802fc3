//! # Strata Codec
//!
//! Self-describing binary serialization for the Strata worker protocol.
//!
//! Every value starts with a one-byte tag (digits for byte strings), and
//! the encoding is canonical:
//! - Mapping keys are written in a fixed order
//! - Integers have no leading zeros and no negative zero
//! - Lengths have no leading zeros
//!
//! Besides the usual scalars and containers, the format carries embedded
//! JSON, compressed documents (zlib or LZ4, detected by preamble) and lazy
//! sequences that are decoded item by item.
//!
//! ## Usage
//!
//! ```
//! use strata_codec::{decode, encode, Value};
//!
//! let value = Value::List(vec![Value::bytes("spam"), Value::Integer(42)]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(bytes, b"l4:spami42ee");
//!
//! let decoded = decode(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compress;
mod decoder;
mod encoder;
mod error;
mod lazy;
pub mod tag;
mod value;

pub use compress::Codec;
pub use decoder::{
    decode, decode_prefix, decode_with, value_len, DecodeOptions, Decoder, JsonMode,
    DEFAULT_MAX_DEPTH,
};
pub use encoder::{encode, Encoder};
pub use error::{CodecError, CodecResult, CompressionError};
pub use lazy::{LazyIter, LazyList};
pub use value::{Compressed, JsonDoc, Value};

/// Trait for types that can be encoded.
pub trait Encode {
    /// Encode this value to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded.
pub trait Decode: Sized {
    /// Decode this value from bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode(bytes)
    }
}
