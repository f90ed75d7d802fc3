//! In-memory index.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use strata_codec::{decode, encode, Value};

use crate::error::{SegmentError, SegmentResult};
use crate::index::{Index, Query, Segment, Values};

/// BTree-backed [`Index`] with sorted keys and sorted, deduplicated values
/// per key.
///
/// Its codec form is a mapping from each key to the list of its values,
/// which is also what the model stage of a worker writes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryIndex {
    entries: BTreeMap<Bytes, BTreeSet<Bytes>>,
}

/// A [`MemoryIndex`] view restricted to a set of values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdView {
    ids: Segment,
}

impl IdView {
    /// Number of identifiers in the view.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the view admits nothing.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns true if `id` is in the view.
    pub fn contains(&self, id: &[u8]) -> bool {
        self.ids.contains(id)
    }
}

impl MemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut index = Self::new();
        for (key, value) in pairs {
            index.insert(key, value);
        }
        index
    }

    /// Adds `value` under `key`. Returns false if it was already there.
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> bool {
        self.entries
            .entry(Bytes::copy_from_slice(key.as_ref()))
            .or_default()
            .insert(Bytes::copy_from_slice(value.as_ref()))
    }

    /// Returns the codec form: a mapping of key to list of values.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.entries
                .iter()
                .map(|(key, values)| {
                    let values = values.iter().map(Value::bytes).collect();
                    (Value::bytes(key), Value::List(values))
                })
                .collect(),
        )
    }

    /// Encodes the index.
    pub fn encode(&self) -> SegmentResult<Vec<u8>> {
        Ok(encode(&self.to_value())?)
    }

    /// Rebuilds an index from its codec form.
    ///
    /// Values may be held in a plain or lazy list.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Malformed`] if `value` is not a mapping of
    /// strings to lists of strings.
    pub fn from_value(value: &Value) -> SegmentResult<Self> {
        let pairs = value
            .as_map()
            .ok_or_else(|| SegmentError::malformed("index is not a mapping"))?;
        let mut index = Self::new();
        for (key, values) in pairs {
            let key = string_bytes(key)
                .ok_or_else(|| SegmentError::malformed(format!("non-string key {key}")))?;
            let slot = index.entries.entry(Bytes::copy_from_slice(key)).or_default();
            let mut add = |v: &Value| -> SegmentResult<()> {
                let v = string_bytes(v)
                    .ok_or_else(|| SegmentError::malformed(format!("non-string value {v}")))?;
                slot.insert(Bytes::copy_from_slice(v));
                Ok(())
            };
            match values {
                Value::List(items) => items.iter().try_for_each(&mut add)?,
                Value::Lazy(lazy) => {
                    for item in lazy.iter() {
                        add(&item?)?;
                    }
                }
                other => {
                    return Err(SegmentError::malformed(format!(
                        "values of {} are not a list: {other}",
                        String::from_utf8_lossy(key)
                    )))
                }
            }
        }
        Ok(index)
    }

    /// Decodes an encoded index.
    pub fn decode(bytes: &[u8]) -> SegmentResult<Self> {
        Self::from_value(&decode(bytes)?)
    }

    /// Adds every posting of `other`.
    pub fn merge(&mut self, other: MemoryIndex) {
        for (key, values) in other.entries {
            self.entries.entry(key).or_default().extend(values);
        }
    }

    fn eval(&self, query: &Query) -> BTreeSet<Bytes> {
        match query {
            Query::Literal(key) => self.entries.get(key).cloned().unwrap_or_default(),
            Query::And(operands) => {
                let mut sets = operands.iter().map(|q| self.eval(q));
                let first = sets.next().unwrap_or_default();
                sets.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
            }
            Query::Or(operands) => operands.iter().flat_map(|q| self.eval(q)).collect(),
        }
    }
}

fn string_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Bytes(b) => Some(b),
        Value::Text(s) => Some(s.as_bytes()),
        _ => None,
    }
}

impl Index for MemoryIndex {
    type View = IdView;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn lookup(&self, key: &[u8]) -> Values<'_> {
        match self.entries.get(key) {
            Some(values) => Box::new(values.iter().cloned()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn keys(&self) -> Values<'_> {
        Box::new(self.entries.keys().cloned())
    }

    fn values(&self) -> Values<'_> {
        Box::new(self.entries.values().flatten().cloned())
    }

    fn unique_values(&self) -> Values<'_> {
        let unique: BTreeSet<&Bytes> = self.entries.values().flatten().collect();
        Box::new(unique.into_iter().cloned())
    }

    fn query<'a>(
        &'a self,
        query: &Query,
        view: Option<&'a IdView>,
    ) -> SegmentResult<Values<'a>> {
        query.validate()?;
        let matched = self.eval(query).into_iter();
        Ok(match view {
            Some(view) => Box::new(matched.filter(move |v| view.contains(v))),
            None => Box::new(matched),
        })
    }

    fn restrict_to(&self, ids: Segment) -> IdView {
        IdView { ids }
    }

    fn admits(view: &IdView, value: &[u8]) -> bool {
        view.contains(value)
    }
}
