//! Index views filtered by segment membership.
//!
//! A [`SegmentedView`] admits a value only if its entity belongs to every
//! segment. It works in one of two modes:
//!
//! - **Predicate mode**, when the caller can extract an entity identifier
//!   from a value. Every read is filtered lazily through the membership
//!   test, so the cost is paid per value read.
//! - **View mode**, when values are the identifiers themselves. The
//!   intersection of the segments is computed once, smallest segment first,
//!   and reads go through the index's own restricted view.
//!
//! Both modes admit exactly the same values.

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;
use strata_codec::Value;

use crate::error::{SegmentError, SegmentResult};
use crate::index::{Index, Query, Segment, Values};

type Identity<'a> = Box<dyn Fn(&Bytes) -> Bytes + 'a>;

/// Membership test over borrowed segments.
enum Membership<'a> {
    One(&'a Segment),
    Two(&'a Segment, &'a Segment),
    Many(&'a [Segment]),
}

impl<'a> Membership<'a> {
    fn new(segments: &'a [Segment]) -> SegmentResult<Self> {
        match segments {
            [] => Err(SegmentError::NoSegments),
            [only] => Ok(Membership::One(only)),
            [first, second] => Ok(Membership::Two(first, second)),
            many => Ok(Membership::Many(many)),
        }
    }

    fn contains(&self, id: &Bytes) -> bool {
        match self {
            Membership::One(seg) => seg.contains(id),
            Membership::Two(a, b) => a.contains(id) && b.contains(id),
            Membership::Many(segs) => segs.iter().all(|seg| seg.contains(id)),
        }
    }
}

struct Predicate<'a> {
    identity: Identity<'a>,
    membership: Membership<'a>,
}

impl Predicate<'_> {
    fn admits(&self, value: &Bytes) -> bool {
        self.membership.contains(&(self.identity)(value))
    }
}

enum Mode<'a, I: Index> {
    Predicate(Predicate<'a>),
    View(I::View),
}

/// Intersection of `segments`, scanning the smallest and probing the rest
/// from smallest to largest.
pub fn intersect(segments: &[Segment]) -> Segment {
    let mut by_size: Vec<&Segment> = segments.iter().collect();
    by_size.sort_by_key(|seg| seg.len());
    let Some((smallest, rest)) = by_size.split_first() else {
        return BTreeSet::new();
    };
    smallest
        .iter()
        .filter(|id| rest.iter().all(|seg| seg.contains(*id)))
        .cloned()
        .collect()
}

/// A read-only view of an index restricted to the entities in every
/// segment.
pub struct SegmentedView<'a, I: Index> {
    index: &'a I,
    mode: Mode<'a, I>,
    labels: Vec<String>,
}

impl<'a, I: Index> SegmentedView<'a, I> {
    /// Predicate mode: `identity` extracts the entity identifier of a value.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NoSegments`] if `segments` is empty.
    pub fn with_identity<F>(index: &'a I, segments: &'a [Segment], identity: F) -> SegmentResult<Self>
    where
        F: Fn(&Bytes) -> Bytes + 'a,
    {
        let membership = Membership::new(segments)?;
        Ok(Self {
            index,
            mode: Mode::Predicate(Predicate {
                identity: Box::new(identity),
                membership,
            }),
            labels: Vec::new(),
        })
    }

    /// View mode: values are entity identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NoSegments`] if `segments` is empty.
    pub fn restricted(index: &'a I, segments: &[Segment]) -> SegmentResult<Self> {
        let ids = match segments {
            [] => return Err(SegmentError::NoSegments),
            [only] => only.clone(),
            many => intersect(many),
        };
        tracing::debug!(
            segments = segments.len(),
            members = ids.len(),
            "segment intersection computed"
        );
        Ok(Self {
            index,
            mode: Mode::View(index.restrict_to(ids)),
            labels: Vec::new(),
        })
    }

    /// Attach display labels for the segments.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Segment labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns true in predicate mode.
    pub fn is_predicate_mode(&self) -> bool {
        matches!(self.mode, Mode::Predicate(_))
    }

    /// The underlying index.
    pub fn index(&self) -> &'a I {
        self.index
    }

    /// Returns true if the base index has `key`. Membership is not checked.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Number of keys in the base index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the base index has no keys.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keys of the base index.
    pub fn keys(&self) -> Values<'a> {
        self.index.keys()
    }

    /// Values under `key` whose entity is in every segment.
    pub fn lookup(&self, key: &[u8]) -> SegmentResult<Values<'_>> {
        match &self.mode {
            Mode::Predicate(pred) => Ok(Box::new(
                self.index.lookup(key).filter(move |v| pred.admits(v)),
            )),
            Mode::View(view) => self
                .index
                .query(&Query::Literal(Bytes::copy_from_slice(key)), Some(view)),
        }
    }

    /// Like [`lookup`](Self::lookup), but `None` if the base index has no
    /// such key.
    pub fn get(&self, key: &[u8]) -> SegmentResult<Option<Values<'_>>> {
        if !self.contains_key(key) {
            return Ok(None);
        }
        self.lookup(key).map(Some)
    }

    /// First admitted value under `key`, or `default`.
    pub fn peek(&self, key: &[u8], default: Bytes) -> SegmentResult<Bytes> {
        Ok(self
            .get(key)?
            .and_then(|mut values| values.next())
            .unwrap_or(default))
    }

    /// Every key with its admitted values, looked up as the iteration
    /// reaches it.
    pub fn items(&self) -> impl Iterator<Item = SegmentResult<(Bytes, Values<'_>)>> + '_ {
        self.keys()
            .map(move |key| self.lookup(&key).map(|values| (key, values)))
    }

    /// Admitted values of every key, key by key.
    pub fn values(&self) -> SegmentResult<Values<'_>> {
        match &self.mode {
            Mode::Predicate(pred) => {
                Ok(Box::new(self.index.values().filter(move |v| pred.admits(v))))
            }
            Mode::View(view) => Ok(Box::new(
                self.index.values().filter(move |v| I::admits(view, v)),
            )),
        }
    }

    /// Every admitted value once.
    pub fn unique_values(&self) -> SegmentResult<Values<'_>> {
        match &self.mode {
            Mode::Predicate(pred) => Ok(Box::new(
                self.index.unique_values().filter(move |v| pred.admits(v)),
            )),
            Mode::View(view) => Ok(Box::new(
                self.index.unique_values().filter(move |v| I::admits(view, v)),
            )),
        }
    }

    /// Evaluate `query` over admitted values.
    pub fn query(&self, query: &Query) -> SegmentResult<Values<'_>> {
        match &self.mode {
            Mode::Predicate(pred) => Ok(Box::new(
                self.index.query(query, None)?.filter(move |v| pred.admits(v)),
            )),
            Mode::View(view) => self.index.query(query, Some(view)),
        }
    }

    /// Admitted values under `key` as a codec list, for output.
    pub fn materialize(&self, key: &[u8]) -> SegmentResult<Value> {
        Ok(Value::List(self.lookup(key)?.map(Value::bytes).collect()))
    }
}

impl<I: Index> fmt::Display for SegmentedView<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentedView[{}]({{", self.labels.join(", "))?;
        for (i, item) in self.items().enumerate() {
            let Ok((key, values)) = item else {
                return Err(fmt::Error);
            };
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: [", String::from_utf8_lossy(&key))?;
            let mut values = values.peekable();
            for (j, value) in values.by_ref().take(3).enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&String::from_utf8_lossy(&value))?;
            }
            if values.peek().is_some() {
                f.write_str(", ...")?;
            }
            f.write_str("]")?;
        }
        f.write_str("})")
    }
}
