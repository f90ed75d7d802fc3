//! Tag-dispatched decoder.

use bytes::Bytes;

use crate::compress;
use crate::error::{CodecError, CodecResult};
use crate::lazy::LazyList;
use crate::tag::{self, Tag};
use crate::value::{JsonDoc, Value};

/// Maximum container nesting accepted by default.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Longest decimal length prefix accepted (enough for any `usize`).
const MAX_LENGTH_DIGITS: usize = 20;

/// How embedded JSON payloads are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonMode {
    /// Parse the payload into a JSON document.
    #[default]
    Parse,
    /// Keep the payload as opaque text.
    Raw,
}

/// Options controlling decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Handling of embedded JSON.
    pub json: JsonMode,
    /// Maximum container nesting depth.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            json: JsonMode::Parse,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    /// Sets the JSON handling mode.
    #[must_use]
    pub const fn json(mut self, mode: JsonMode) -> Self {
        self.json = mode;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Decode exactly one value from `bytes`.
///
/// # Errors
///
/// Returns a format error on unknown tags, malformed lengths or integers,
/// truncated input, or bytes left over after the value.
pub fn decode(bytes: &[u8]) -> CodecResult<Value> {
    decode_with(Bytes::copy_from_slice(bytes), DecodeOptions::default())
}

/// Decode exactly one value from a shared buffer.
///
/// Lazy sequences in the result borrow sub-slices of `bytes` instead of
/// copying them.
pub fn decode_with(bytes: Bytes, options: DecodeOptions) -> CodecResult<Value> {
    let mut decoder = Decoder::with_options(bytes, options);
    let value = decoder.decode()?;
    decoder.finish()?;
    Ok(value)
}

/// Decode the value at the start of `bytes`, returning it together with the
/// number of bytes it occupied.
pub fn decode_prefix(bytes: &[u8]) -> CodecResult<(Value, usize)> {
    let mut decoder = Decoder::new(Bytes::copy_from_slice(bytes));
    let value = decoder.decode()?;
    Ok((value, decoder.position()))
}

/// Measure the encoded length of the value at the start of `bytes` without
/// decoding it. Compressed payloads are not inflated.
pub fn value_len(bytes: &[u8]) -> CodecResult<usize> {
    let mut decoder = Decoder::new(Bytes::copy_from_slice(bytes));
    decoder.skip()?;
    Ok(decoder.position())
}

/// A decoder over a shared buffer.
pub struct Decoder {
    data: Bytes,
    pos: usize,
    depth: usize,
    options: DecodeOptions,
}

impl Decoder {
    /// Create a decoder with default options.
    pub fn new(data: Bytes) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    /// Create a decoder with the given options.
    pub fn with_options(data: Bytes, options: DecodeOptions) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            options,
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fail if any bytes remain after the last decoded value.
    pub fn finish(&self) -> CodecResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                consumed: self.pos,
                total: self.data.len(),
            })
        }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let start = self.pos;
        let tag = self.peek_tag()?;
        match tag {
            Tag::Integer => self.decode_integer().map(Value::Integer),
            Tag::Bytes => self.read_sized().map(|b| Value::Bytes(b.to_vec())),
            Tag::Unicode => {
                self.pos += 1;
                let payload = self.read_sized()?;
                String::from_utf8(payload.to_vec())
                    .map(Value::Text)
                    .map_err(|_| CodecError::InvalidUtf8 { offset: start })
            }
            Tag::Bool => self.decode_bool(),
            Tag::Json => {
                self.pos += 1;
                let payload = self.read_sized()?;
                match self.options.json {
                    JsonMode::Parse => Ok(Value::Json(JsonDoc::Parsed(serde_json::from_slice(
                        &payload,
                    )?))),
                    JsonMode::Raw => Ok(Value::Json(JsonDoc::Raw(payload))),
                }
            }
            Tag::Compressed => {
                self.pos += 1;
                let payload = self.read_sized()?;
                let inflated = compress::decompress(&payload)?;
                let mut inner = Decoder {
                    data: Bytes::from(inflated),
                    pos: 0,
                    depth: self.depth + 1,
                    options: self.options,
                };
                inner.check_depth()?;
                let value = inner.decode()?;
                inner.finish()?;
                Ok(value)
            }
            Tag::Lazy => {
                self.pos += 1;
                let payload = self.read_sized()?;
                Ok(Value::Lazy(LazyList::with_options(payload, self.options)))
            }
            Tag::List => {
                self.enter()?;
                let mut items = Vec::new();
                while !self.at_end()? {
                    items.push(self.decode()?);
                }
                self.leave();
                Ok(Value::List(items))
            }
            Tag::Map => {
                self.enter()?;
                let mut pairs = Vec::new();
                while !self.at_end()? {
                    let key = self.decode()?;
                    let value = self.decode()?;
                    pairs.push((key, value));
                }
                self.leave();
                Ok(Value::Map(pairs))
            }
        }
    }

    /// Advance past the next value without building it.
    pub fn skip(&mut self) -> CodecResult<()> {
        match self.peek_tag()? {
            Tag::Integer => self.decode_integer().map(|_| ()),
            Tag::Bool => self.decode_bool().map(|_| ()),
            Tag::Bytes => self.read_sized().map(|_| ()),
            Tag::Unicode | Tag::Json | Tag::Compressed | Tag::Lazy => {
                self.pos += 1;
                self.read_sized().map(|_| ())
            }
            Tag::List | Tag::Map => {
                self.enter()?;
                while !self.at_end()? {
                    self.skip()?;
                }
                self.leave();
                Ok(())
            }
        }
    }

    fn peek_tag(&self) -> CodecResult<Tag> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof {
            offset: self.pos,
            needed: 1,
        })?;
        Tag::from_byte(byte).ok_or(CodecError::UnknownTag {
            tag: byte,
            offset: self.pos,
        })
    }

    fn check_depth(&self) -> CodecResult<()> {
        if self.depth > self.options.max_depth {
            return Err(CodecError::DepthExceeded {
                max: self.options.max_depth,
            });
        }
        Ok(())
    }

    /// Consume a container opener.
    fn enter(&mut self) -> CodecResult<()> {
        self.depth += 1;
        self.check_depth()?;
        self.pos += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consume the container terminator if it is next.
    pub(crate) fn at_end(&mut self) -> CodecResult<bool> {
        match self.data.get(self.pos) {
            Some(&tag::END) => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
            }),
        }
    }

    fn decode_integer(&mut self) -> CodecResult<i64> {
        let start = self.pos;
        let body_start = start + 1;
        let end = self.data[body_start.min(self.data.len())..]
            .iter()
            .position(|&b| b == tag::END)
            .map(|i| body_start + i)
            .ok_or(CodecError::UnexpectedEof {
                offset: self.data.len(),
                needed: 1,
            })?;
        let literal = &self.data[body_start..end];

        let digits = literal.strip_prefix(b"-").unwrap_or(literal);
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(CodecError::malformed_integer(start, "not a decimal literal"));
        }
        if digits[0] == b'0' && (digits.len() > 1 || digits.len() != literal.len()) {
            return Err(CodecError::malformed_integer(start, "non-canonical zero"));
        }
        // The literal is ASCII, checked above.
        let text = std::str::from_utf8(literal)
            .map_err(|_| CodecError::malformed_integer(start, "not a decimal literal"))?;
        let n = text
            .parse::<i64>()
            .map_err(|_| CodecError::malformed_integer(start, "out of range"))?;

        self.pos = end + 1;
        Ok(n)
    }

    fn decode_bool(&mut self) -> CodecResult<Value> {
        let start = self.pos;
        let flag = *self.data.get(start + 1).ok_or(CodecError::UnexpectedEof {
            offset: start + 1,
            needed: 1,
        })?;
        let value = match flag {
            b't' => true,
            b'f' => false,
            _ => return Err(CodecError::MalformedBool { offset: start }),
        };
        self.pos += 2;
        Ok(Value::Bool(value))
    }

    /// Read `<decimal len>:<payload>` at the cursor.
    fn read_sized(&mut self) -> CodecResult<Bytes> {
        let start = self.pos;
        let mut len: usize = 0;
        let mut digits = 0;
        loop {
            let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
            })?;
            match byte {
                b'0'..=b'9' => {
                    digits += 1;
                    if digits > MAX_LENGTH_DIGITS {
                        return Err(CodecError::malformed_length(start, "too many digits"));
                    }
                    len = len
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(usize::from(byte - b'0')))
                        .ok_or_else(|| CodecError::malformed_length(start, "overflow"))?;
                    self.pos += 1;
                }
                tag::COLON if digits > 0 => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(CodecError::malformed_length(start, "expected digit or ':'")),
            }
        }
        if digits > 1 && self.data[start] == b'0' {
            return Err(CodecError::malformed_length(start, "leading zero"));
        }

        let available = self.data.len() - self.pos;
        if len > available {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: len - available,
            });
        }
        let payload = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(payload)
    }
}
