//! Index trait and query expressions.

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;

use crate::error::{SegmentError, SegmentResult};

/// A set of entity identifiers.
pub type Segment = BTreeSet<Bytes>;

/// Lazily produced values of an index.
pub type Values<'a> = Box<dyn Iterator<Item = Bytes> + 'a>;

/// A boolean query over index keys.
///
/// A literal matches the values stored under its key. Conjunction and
/// disjunction intersect and unite the matches of their operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Values stored under one key.
    Literal(Bytes),
    /// Values matched by every operand.
    And(Vec<Query>),
    /// Values matched by any operand.
    Or(Vec<Query>),
}

impl Query {
    /// Query for one key.
    pub fn literal(key: impl AsRef<[u8]>) -> Self {
        Query::Literal(Bytes::copy_from_slice(key.as_ref()))
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    pub fn and(self, other: Query) -> Self {
        match self {
            Query::And(mut operands) => {
                operands.push(other);
                Query::And(operands)
            }
            first => Query::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested disjunctions.
    pub fn or(self, other: Query) -> Self {
        match self {
            Query::Or(mut operands) => {
                operands.push(other);
                Query::Or(operands)
            }
            first => Query::Or(vec![first, other]),
        }
    }

    /// Check that every conjunction and disjunction has operands.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Query`] naming the first empty operator.
    pub fn validate(&self) -> SegmentResult<()> {
        match self {
            Query::Literal(_) => Ok(()),
            Query::And(operands) if operands.is_empty() => {
                Err(SegmentError::query("empty conjunction"))
            }
            Query::Or(operands) if operands.is_empty() => {
                Err(SegmentError::query("empty disjunction"))
            }
            Query::And(operands) | Query::Or(operands) => {
                operands.iter().try_for_each(Query::validate)
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (operands, op) = match self {
            Query::Literal(key) => return write!(f, "{}", String::from_utf8_lossy(key)),
            Query::And(operands) => (operands, " & "),
            Query::Or(operands) => (operands, " | "),
        };
        f.write_str("(")?;
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            write!(f, "{operand}")?;
        }
        f.write_str(")")
    }
}

/// A read-only multimap from keys to entity values.
///
/// Keys and values are opaque byte strings. An index can also hand out a
/// view restricted to a set of identifiers, which [`Index::query`] accepts
/// to answer queries inside that set only.
pub trait Index {
    /// Identifier-restricted view produced by [`Index::restrict_to`].
    type View;

    /// Returns true if the index has values under `key`.
    fn contains_key(&self, key: &[u8]) -> bool;

    /// Returns the number of keys.
    fn len(&self) -> usize;

    /// Returns true if the index has no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values stored under `key`.
    fn lookup(&self, key: &[u8]) -> Values<'_>;

    /// All keys.
    fn keys(&self) -> Values<'_>;

    /// Values of every key, key by key.
    fn values(&self) -> Values<'_>;

    /// Every distinct value once.
    fn unique_values(&self) -> Values<'_>;

    /// Evaluate `query`, inside `view` if one is given.
    fn query<'a>(&'a self, query: &Query, view: Option<&'a Self::View>)
        -> SegmentResult<Values<'a>>;

    /// Build a view restricted to `ids`.
    fn restrict_to(&self, ids: Segment) -> Self::View;

    /// Returns true if `value` is admitted by `view`.
    fn admits(view: &Self::View, value: &[u8]) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_flatten() {
        let q = Query::literal("a").and(Query::literal("b")).and(Query::literal("c"));
        assert_eq!(
            q,
            Query::And(vec![
                Query::literal("a"),
                Query::literal("b"),
                Query::literal("c")
            ])
        );
        assert_eq!(q.to_string(), "(a & b & c)");

        let q = Query::literal("a").or(Query::literal("b").and(Query::literal("c")));
        assert_eq!(q.to_string(), "(a | (b & c))");
    }

    #[test]
    fn validate_rejects_empty_operators() {
        assert!(Query::literal("a").validate().is_ok());
        assert_eq!(
            Query::And(vec![]).validate(),
            Err(SegmentError::query("empty conjunction"))
        );
        let nested = Query::literal("a").or(Query::Or(vec![]));
        assert_eq!(
            nested.validate(),
            Err(SegmentError::query("empty disjunction"))
        );
    }
}
