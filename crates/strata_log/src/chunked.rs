//! The chunked log.

use std::iter::Rev;
use std::slice;

use bytes::Bytes;
use strata_codec::{
    decode, encode, tag, value_len, Compressed, Encoder, LazyIter, LazyList, Value,
};

use crate::config::LogConfig;
use crate::error::{LogError, LogResult};

/// Lifecycle of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// Accepting pushes.
    Building,
    /// Encoded; pushes are rejected.
    Sealed,
}

/// An append-only event log that iterates newest first.
///
/// ```text
/// l  y<head>  z<newest chunk>  ...  z<oldest chunk>  e
/// ```
///
/// New items go to an uncompressed head. Once the head grows past the
/// chunk size it is sealed into a compressed lazy chunk at the newest end
/// of the tail. Chunks are only decompressed when iteration reaches them.
#[derive(Debug, Clone)]
pub struct ChunkedLog {
    config: LogConfig,
    /// Encoded head items, oldest first.
    head: Vec<Bytes>,
    head_size: usize,
    /// Encoded tail chunks, oldest first.
    tail: Vec<Bytes>,
    state: LogState,
}

impl ChunkedLog {
    /// Create an empty log.
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            head: Vec::new(),
            head_size: 0,
            tail: Vec::new(),
            state: LogState::Building,
        }
    }

    /// Reopen an encoded log for further appends.
    ///
    /// Tail chunks are split by length only and stay compressed.
    pub fn from_encoded(encoded: impl Into<Bytes>, config: LogConfig) -> LogResult<Self> {
        let encoded: Bytes = encoded.into();
        if encoded.first() != Some(&tag::LIST) || encoded.last() != Some(&tag::END) {
            return Err(LogError::malformed("log must be a bracketed list"));
        }

        let mut log = Self::new(config);
        let mut spans = split_items(&encoded, 1, encoded.len() - 1)?;

        if spans.first().map(|s| s.first()) == Some(Some(&tag::LAZY)) {
            let head = spans.remove(0);
            let Value::Lazy(lazy) = decode(&head)? else {
                return Err(LogError::malformed("log head is not a lazy sequence"));
            };
            let raw = lazy.as_bytes();
            let items = if raw.first() == Some(&tag::LIST) {
                if raw.last() != Some(&tag::END) {
                    return Err(LogError::malformed("unterminated log head"));
                }
                split_items(raw, 1, raw.len() - 1)?
            } else {
                split_items(raw, 0, raw.len())?
            };
            log.head_size = items.iter().map(Bytes::len).sum();
            log.head = items.into_iter().rev().collect();
        }

        spans.reverse();
        log.tail = spans;
        Ok(log)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LogState {
        self.state
    }

    /// Whether the log holds no items and no chunks.
    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.tail.is_empty()
    }

    /// Number of sealed chunks.
    pub fn len_chunks(&self) -> usize {
        self.tail.len()
    }

    /// Encoded size of the head.
    pub fn head_size(&self) -> usize {
        self.head_size
    }

    /// Append items; the last item of the batch becomes the newest.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Sealed`] once the log has been encoded.
    pub fn push<I>(&mut self, items: I) -> LogResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        if self.state == LogState::Sealed {
            return Err(LogError::Sealed);
        }
        for item in items {
            let encoded = Bytes::from(encode(&item)?);
            self.head_size += encoded.len();
            self.head.push(encoded);
            if self.head_size > self.config.chunk_size() {
                self.seal_head()?;
            }
        }
        Ok(())
    }

    fn seal_head(&mut self) -> LogResult<()> {
        let lazy = LazyList::new(self.head_bytes());
        let chunk = Compressed::new(&Value::Lazy(lazy), self.config.codec)?;
        let encoded = encode(&Value::Compressed(chunk))?;
        tracing::debug!(
            items = self.head.len(),
            raw = self.head_size,
            compressed = encoded.len(),
            "sealed log chunk"
        );
        self.tail.push(Bytes::from(encoded));
        self.head.clear();
        self.head_size = 0;
        Ok(())
    }

    /// Head items as a bracketed list, newest first.
    fn head_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::with_capacity(self.head_size + 2);
        enc.begin_list();
        for item in self.head.iter().rev() {
            enc.write_raw(item);
        }
        enc.end();
        enc.into_bytes()
    }

    /// Encode the log and seal it.
    ///
    /// The result is a list holding the head as a lazy sequence followed by
    /// the tail chunks, newest first. Iterating it as a [`LazyList`] yields
    /// the same items in the same order as [`ChunkedLog::iter`].
    pub fn encode(&mut self) -> Bytes {
        let head = self.head_bytes();
        let tail_size: usize = self.tail.iter().map(Bytes::len).sum();
        let mut enc = Encoder::with_capacity(head.len() + tail_size + 16);
        enc.begin_list();
        enc.write_sized(Some(tag::LAZY), &head);
        for chunk in self.tail.iter().rev() {
            enc.write_raw(chunk);
        }
        enc.end();
        self.state = LogState::Sealed;
        Bytes::from(enc.into_bytes())
    }

    /// Encode the log and seal it, as a lazy value.
    pub fn into_value(mut self) -> Value {
        Value::Lazy(LazyList::new(self.encode()))
    }

    /// Iterate newest first.
    pub fn iter(&self) -> LogIter<'_> {
        LogIter {
            head: self.head.iter().rev(),
            tail: self.tail.iter().rev(),
            chunk: None,
        }
    }

    /// Drop old tail chunks whose newest item fails `keep`.
    ///
    /// Starting from the oldest chunk, whole chunks are dropped while their
    /// newest item fails the predicate; the first passing chunk stops the
    /// scan. Only one item per chunk is inspected, so items failing the
    /// predicate may survive inside retained chunks. The head is pruned,
    /// oldest items first, only when no chunk is left.
    ///
    /// Returns the number of chunks dropped.
    pub fn drop_chunks<F>(&mut self, mut keep: F) -> LogResult<usize>
    where
        F: FnMut(&Value) -> bool,
    {
        let mut dropped = 0;
        for chunk in &self.tail {
            if let Some(newest) = LazyList::new(chunk.clone()).iter().next() {
                if keep(&newest?) {
                    break;
                }
            }
            dropped += 1;
        }
        self.tail.drain(..dropped);

        if self.tail.is_empty() {
            let mut pruned = 0;
            for item in &self.head {
                if keep(&decode(item)?) {
                    break;
                }
                pruned += 1;
            }
            for item in self.head.drain(..pruned) {
                self.head_size -= item.len();
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.tail.len(), "dropped log chunks");
        }
        Ok(dropped)
    }
}

impl Default for ChunkedLog {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl<'a> IntoIterator for &'a ChunkedLog {
    type Item = LogResult<Value>;
    type IntoIter = LogIter<'a>;

    fn into_iter(self) -> LogIter<'a> {
        self.iter()
    }
}

/// Newest-first iterator over a [`ChunkedLog`].
pub struct LogIter<'a> {
    head: Rev<slice::Iter<'a, Bytes>>,
    tail: Rev<slice::Iter<'a, Bytes>>,
    chunk: Option<LazyIter>,
}

impl Iterator for LogIter<'_> {
    type Item = LogResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.head.next() {
            return Some(decode(item).map_err(LogError::from));
        }
        loop {
            if let Some(chunk) = self.chunk.as_mut() {
                match chunk.next() {
                    Some(item) => return Some(item.map_err(LogError::from)),
                    None => self.chunk = None,
                }
            }
            let next = self.tail.next()?;
            self.chunk = Some(LazyList::new(next.clone()).iter());
        }
    }
}

/// Split `buf[start..end]` into the spans of consecutive encoded values.
fn split_items(buf: &Bytes, start: usize, end: usize) -> LogResult<Vec<Bytes>> {
    let mut spans = Vec::new();
    let mut pos = start;
    while pos < end {
        let len = value_len(&buf[pos..end])?;
        spans.push(buf.slice(pos..pos + len));
        pos += len;
    }
    Ok(spans)
}
