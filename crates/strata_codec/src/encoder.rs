//! Canonical encoder.

use std::io::Write;

use crate::error::CodecResult;
use crate::tag;
use crate::value::{JsonDoc, Value};

/// Encode a value to bytes.
///
/// Mapping keys are written in canonical order, so equal mappings encode to
/// identical bytes regardless of construction order.
///
/// # Errors
///
/// Returns an error if an embedded JSON document cannot be serialized.
pub fn encode(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// An encoder writing into a growable buffer.
///
/// Besides whole values, the encoder can splice pre-encoded bytes, which is
/// how lazy sequences and chunked logs are assembled without re-encoding
/// their items.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Integer(n) => self.encode_integer(*n),
            Value::Bytes(b) => self.write_sized(None, b),
            Value::Text(s) => self.write_sized(Some(tag::UNICODE), s.as_bytes()),
            Value::Bool(b) => self.encode_bool(*b),
            Value::Json(doc) => self.encode_json(doc)?,
            Value::Compressed(c) => self.write_sized(Some(tag::COMPRESSED), c.data()),
            Value::Lazy(lazy) => self.write_sized(Some(tag::LAZY), lazy.as_bytes()),
            Value::List(items) => {
                self.begin_list();
                for item in items {
                    self.encode(item)?;
                }
                self.end();
            }
            Value::Map(pairs) => self.encode_map(pairs)?,
        }
        Ok(())
    }

    /// Write a tagged, length-prefixed payload. `None` writes a byte string.
    pub fn write_sized(&mut self, tag: Option<u8>, payload: &[u8]) {
        if let Some(tag) = tag {
            self.buffer.push(tag);
        }
        // Writing into a Vec cannot fail.
        let _ = write!(self.buffer, "{}", payload.len());
        self.buffer.push(tag::COLON);
        self.buffer.extend_from_slice(payload);
    }

    /// Splice bytes that already hold complete encoded values.
    pub fn write_raw(&mut self, encoded: &[u8]) {
        self.buffer.extend_from_slice(encoded);
    }

    /// Open a list; close it with [`Encoder::end`].
    pub fn begin_list(&mut self) {
        self.buffer.push(tag::LIST);
    }

    /// Close the innermost list or mapping.
    pub fn end(&mut self) {
        self.buffer.push(tag::END);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn encode_integer(&mut self, n: i64) {
        self.buffer.push(tag::INTEGER);
        let _ = write!(self.buffer, "{n}");
        self.buffer.push(tag::END);
    }

    fn encode_bool(&mut self, b: bool) {
        self.buffer.push(tag::BOOL);
        self.buffer.push(if b { b't' } else { b'f' });
    }

    fn encode_json(&mut self, doc: &JsonDoc) -> CodecResult<()> {
        match doc {
            JsonDoc::Parsed(v) => {
                let text = serde_json::to_vec(v)?;
                self.write_sized(Some(tag::JSON), &text);
            }
            JsonDoc::Raw(raw) => self.write_sized(Some(tag::JSON), raw),
        }
        Ok(())
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut sorted: Vec<&(Value, Value)> = pairs.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp_canonical(&b.0));

        self.buffer.push(tag::MAP);
        for (key, value) in sorted {
            self.encode(key)?;
            self.encode(value)?;
        }
        self.end();
        Ok(())
    }
}
