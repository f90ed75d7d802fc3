//! Dynamic value type.

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

use crate::compress::{self, Codec};
use crate::error::CodecResult;
use crate::lazy::LazyList;

/// A dynamic value.
///
/// Decoding never produces [`Value::Compressed`]: a compressed document
/// decodes to the value it wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer.
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Unicode string.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Embedded JSON document.
    Json(JsonDoc),
    /// Compressed document, already compressed.
    Compressed(Compressed),
    /// Lazily decoded sequence.
    Lazy(LazyList),
    /// List of values.
    List(Vec<Value>),
    /// Mapping (keys are sorted on encode).
    Map(Vec<(Value, Value)>),
}

/// Payload of an embedded JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonDoc {
    /// Parsed document, serialized on encode.
    Parsed(serde_json::Value),
    /// Opaque JSON text, written back untouched on encode.
    Raw(Bytes),
}

impl JsonDoc {
    /// Parse the document, whichever form it is held in.
    pub fn to_json(&self) -> CodecResult<serde_json::Value> {
        match self {
            JsonDoc::Parsed(v) => Ok(v.clone()),
            JsonDoc::Raw(raw) => Ok(serde_json::from_slice(raw)?),
        }
    }
}

/// A compressed document: the compressed encoding of one inner value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    codec: Codec,
    data: Bytes,
}

impl Compressed {
    /// Encode and compress `value`.
    pub fn new(value: &Value, codec: Codec) -> CodecResult<Self> {
        let encoded = crate::encode(value)?;
        Self::from_encoded(&encoded, codec)
    }

    /// Compress bytes that are already a complete encoded value.
    pub fn from_encoded(encoded: &[u8], codec: Codec) -> CodecResult<Self> {
        let data = compress::compress(codec, encoded)?;
        Ok(Self {
            codec,
            data: Bytes::from(data),
        })
    }

    /// Codec that produced the payload.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Compressed payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Value {
    /// Create a mapping with keys in canonical order.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Create a byte string.
    pub fn bytes(b: impl AsRef<[u8]>) -> Self {
        Value::Bytes(b.as_ref().to_vec())
    }

    /// Compare two values for canonical mapping-key order.
    ///
    /// Integers sort first, numerically. Byte and unicode strings sort
    /// together by raw bytes, so `"b"` sorts after `"ab"` regardless of the
    /// length prefix. Anything else sorts after strings, by encoding.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            _ => {
                let rank = self.key_rank().cmp(&other.key_rank());
                if rank != Ordering::Equal {
                    return rank;
                }
                match (self.string_bytes(), other.string_bytes()) {
                    (Some(a), Some(b)) => a
                        .cmp(b)
                        .then_with(|| self.is_text().cmp(&other.is_text())),
                    _ => crate::encode(self).ok().cmp(&crate::encode(other).ok()),
                }
            }
        }
    }

    fn key_rank(&self) -> u8 {
        match self {
            Value::Integer(_) => 0,
            Value::Bytes(_) | Value::Text(_) => 1,
            Value::Bool(_) => 2,
            _ => 3,
        }
    }

    fn string_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a unicode string or a byte
    /// string holding valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a mapping, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Get this value as a lazy sequence, if it is one.
    pub fn as_lazy(&self) -> Option<&LazyList> {
        match self {
            Value::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    /// Look up a string key in this mapping. Byte and unicode keys match.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.string_bytes() == Some(key.as_bytes()))
            .map(|(_, v)| v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Json(JsonDoc::Parsed(v)) => write!(f, "{v}"),
            Value::Json(JsonDoc::Raw(raw)) => write!(f, "{}", String::from_utf8_lossy(raw)),
            Value::Compressed(c) => write!(f, "<{} bytes {}>", c.data.len(), c.codec.name()),
            Value::Lazy(lazy) => write!(f, "<lazy {} bytes>", lazy.as_bytes().len()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(JsonDoc::Parsed(v))
    }
}

impl From<LazyList> for Value {
    fn from(lazy: LazyList) -> Self {
        Value::Lazy(lazy)
    }
}

impl From<Compressed> for Value {
    fn from(c: Compressed) -> Self {
        Value::Compressed(c)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_sorted_by_raw_bytes() {
        let map = Value::map(vec![
            (Value::bytes("b"), Value::Integer(1)),
            (Value::bytes("ab"), Value::Integer(2)),
            (Value::bytes("aaaaaaaaaaa"), Value::Integer(3)),
        ]);

        let keys: Vec<_> = map
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["aaaaaaaaaaa", "ab", "b"]);
    }

    #[test]
    fn integer_keys_sort_numerically_before_strings() {
        let mut keys = vec![
            Value::from("a"),
            Value::Integer(10),
            Value::Integer(-3),
            Value::Integer(2),
        ];
        keys.sort_by(Value::cmp_canonical);
        assert_eq!(
            keys,
            vec![
                Value::Integer(-3),
                Value::Integer(2),
                Value::Integer(10),
                Value::from("a"),
            ]
        );
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
        assert_eq!(Value::bytes("hello").as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![0xff]).as_text(), None);
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn map_get_matches_both_string_kinds() {
        let map = Value::map(vec![
            (Value::bytes("type"), Value::bytes("model")),
            (Value::from("event"), Value::Integer(7)),
        ]);

        assert_eq!(map.get("type"), Some(&Value::bytes("model")));
        assert_eq!(map.get("event"), Some(&Value::Integer(7)));
        assert_eq!(map.get("missing"), None);
        assert_eq!(Value::Integer(1).get("type"), None);
    }

    #[test]
    fn display_is_readable() {
        let v = Value::List(vec![Value::Integer(1), Value::bytes("a"), Value::Bool(false)]);
        assert_eq!(v.to_string(), "[1, \"a\", false]");
    }
}
