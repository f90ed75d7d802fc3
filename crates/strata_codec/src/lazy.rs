//! Lazily decoded sequences.
//!
//! A lazy sequence holds raw encoded bytes and decodes one item at a time.
//! The raw bytes are either a complete `l…e` list or a bare concatenation of
//! items. Iteration flattens nested lazy sequences, including ones wrapped
//! in a compressed document, so consumers only ever see leaf items.

use std::fmt;

use bytes::Bytes;

use crate::decoder::{DecodeOptions, Decoder};
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use crate::tag;
use crate::value::Value;

/// A sequence whose items are decoded on demand.
///
/// Raw bytes starting with `l` are read as one list; anything else is read
/// as concatenated items. Equality compares the decoded items, so a bare
/// and a bracketed encoding of the same items are equal.
#[derive(Clone)]
pub struct LazyList {
    raw: Bytes,
    options: DecodeOptions,
}

impl LazyList {
    /// Wrap raw encoded bytes.
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self::with_options(raw.into(), DecodeOptions::default())
    }

    /// Wrap raw encoded bytes, decoding items with `options`.
    pub fn with_options(raw: Bytes, options: DecodeOptions) -> Self {
        Self { raw, options }
    }

    /// An empty sequence.
    pub fn empty() -> Self {
        Self::new(Bytes::from_static(b"le"))
    }

    /// Encode `values` into a bracketed lazy sequence.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> CodecResult<Self> {
        let mut encoder = Encoder::new();
        encoder.begin_list();
        for value in values {
            encoder.encode(value)?;
        }
        encoder.end();
        Ok(Self::new(encoder.into_bytes()))
    }

    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.raw
    }

    /// Iterate over the decoded leaf items.
    pub fn iter(&self) -> LazyIter {
        LazyIter {
            stack: vec![Frame::open(self.raw.clone(), self.options)],
            max_depth: self.options.max_depth,
        }
    }

    /// Decode every item.
    pub fn to_vec(&self) -> CodecResult<Vec<Value>> {
        self.iter().collect()
    }
}

impl Default for LazyList {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for LazyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("raw", &String::from_utf8_lossy(&self.raw))
            .finish()
    }
}

impl PartialEq for LazyList {
    fn eq(&self, other: &Self) -> bool {
        if self.raw == other.raw {
            return true;
        }
        match (self.to_vec(), other.to_vec()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LazyList {}

impl<'a> IntoIterator for &'a LazyList {
    type Item = CodecResult<Value>;
    type IntoIter = LazyIter;

    fn into_iter(self) -> LazyIter {
        self.iter()
    }
}

struct Frame {
    decoder: Decoder,
    bracketed: bool,
}

impl Frame {
    fn open(raw: Bytes, options: DecodeOptions) -> Self {
        let bracketed = raw.first() == Some(&tag::LIST);
        let body = if bracketed { raw.slice(1..) } else { raw };
        Self {
            decoder: Decoder::with_options(body, options),
            bracketed,
        }
    }

    /// Decode the next item of this frame, or `None` when it is exhausted.
    fn next_item(&mut self) -> CodecResult<Option<Value>> {
        if self.bracketed {
            if self.decoder.at_end()? {
                self.decoder.finish()?;
                return Ok(None);
            }
        } else if self.decoder.is_empty() {
            return Ok(None);
        }
        self.decoder.decode().map(Some)
    }
}

/// Iterator over the leaf items of a [`LazyList`].
///
/// Yields an error at most once and then stops.
pub struct LazyIter {
    stack: Vec<Frame>,
    max_depth: usize,
}

impl Iterator for LazyIter {
    type Item = CodecResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame.next_item() {
                Ok(None) => {
                    self.stack.pop();
                }
                Ok(Some(Value::Lazy(nested))) => {
                    if self.stack.len() >= self.max_depth {
                        self.stack.clear();
                        return Some(Err(CodecError::DepthExceeded {
                            max: self.max_depth,
                        }));
                    }
                    self.stack.push(Frame::open(nested.raw, nested.options));
                }
                Ok(Some(value)) => return Some(Ok(value)),
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
