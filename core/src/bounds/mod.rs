//! Column predicates and index scan bounds
//!
//! Callers describe what they want with [`WhereClause`]s; the compiler in
//! this module turns each clause into a [`ScanBound`] over an index's key
//! tuples. Bounds can only be produced by the compiler.

mod compiler;

pub use compiler::compile_bounds;

use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use thiserror::Error;

use crate::models::{Record, Value};
use crate::tuple::{compare_values, KeyPart, Tuple};

/// Bounds compilation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    /// Predicate on a column the index does not cover
    #[error("cannot compile bounds: column {column} is not part of the index")]
    UnknownColumn {
        /// Offending column
        column: String,
    },

    /// Equality and range predicates on the same column
    #[error("cannot compile bounds: column {column} has both an equality and a range predicate")]
    ConflictingPredicates {
        /// Offending column
        column: String,
    },

    /// Predicate on a column past the usable index prefix
    #[error("cannot compile bounds: predicate on {column} skips over an unconstrained leading column")]
    PrefixViolation {
        /// Offending column
        column: String,
    },

    /// The clause constrains no leading column
    #[error("cannot compile bounds: no predicate on a leading index column")]
    EmptyPrefix,

    /// A range was requested on an equality-only index
    #[error("cannot compile bounds: index {index} only supports equality lookups")]
    RangeOnEqualityIndex {
        /// Index name
        index: String,
    },
}

/// Predicates on a single column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPredicate {
    /// Column equals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,

    /// Column greater than
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,

    /// Column greater than or equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,

    /// Column less than
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,

    /// Column less than or equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl ColumnPredicate {
    /// Whether no predicate is set
    pub fn is_empty(&self) -> bool {
        self.eq.is_none() && !self.has_range()
    }

    /// Whether any of gt/gte/lt/lte is set
    pub fn has_range(&self) -> bool {
        self.gt.is_some() || self.gte.is_some() || self.lt.is_some() || self.lte.is_some()
    }

    /// The single value this column is pinned to, if any
    ///
    /// That is an explicit `eq`, or `gte` and `lte` on the same value with
    /// no strict bound alongside.
    pub fn effective_eq(&self) -> Option<&Value> {
        if let Some(value) = &self.eq {
            return Some(value);
        }

        match (&self.gte, &self.lte, &self.gt, &self.lt) {
            (Some(low), Some(high), None, None) if compare_values(low, high) == Ordering::Equal => Some(low),
            _ => None,
        }
    }

    /// Check a single value against every predicate
    pub fn matches(&self, value: &Value) -> bool {
        let cmp = |other: &Value| compare_values(value, other);

        self.eq.as_ref().map_or(true, |v| cmp(v) == Ordering::Equal)
            && self.gt.as_ref().map_or(true, |v| cmp(v) == Ordering::Greater)
            && self.gte.as_ref().map_or(true, |v| cmp(v) != Ordering::Less)
            && self.lt.as_ref().map_or(true, |v| cmp(v) == Ordering::Less)
            && self.lte.as_ref().map_or(true, |v| cmp(v) != Ordering::Greater)
    }
}

/// A conjunction of per-column predicates
///
/// A list of clauses means their disjunction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereClause {
    predicates: BTreeMap<String, ColumnPredicate>,
}

impl WhereClause {
    /// Create an empty clause
    pub fn new() -> Self {
        Self::default()
    }

    fn column(&mut self, column: impl Into<String>) -> &mut ColumnPredicate {
        self.predicates.entry(column.into()).or_default()
    }

    /// Require `column == value`
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column(column).eq = Some(value.into());
        self
    }

    /// Require `column > value`
    pub fn gt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column(column).gt = Some(value.into());
        self
    }

    /// Require `column >= value`
    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column(column).gte = Some(value.into());
        self
    }

    /// Require `column < value`
    pub fn lt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column(column).lt = Some(value.into());
        self
    }

    /// Require `column <= value`
    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column(column).lte = Some(value.into());
        self
    }

    /// Predicates on one column
    pub fn predicate(&self, column: &str) -> Option<&ColumnPredicate> {
        self.predicates.get(column).filter(|p| !p.is_empty())
    }

    /// All constrained columns with their predicates
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &ColumnPredicate)> {
        self.predicates
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(column, p)| (column.as_str(), p))
    }

    /// Whether the clause constrains nothing
    pub fn is_empty(&self) -> bool {
        self.predicates().next().is_none()
    }

    /// Check an already loaded record against the clause
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates()
            .all(|(column, predicate)| predicate.matches(&record.column_value(column)))
    }
}

/// One end of a scan bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEnd {
    key: Tuple,
    inclusive: bool,
}

impl RangeEnd {
    pub(crate) fn new(key: Tuple, inclusive: bool) -> Self {
        RangeEnd { key, inclusive }
    }

    /// Bound tuple, possibly shorter than the stored keys
    pub fn key(&self) -> &Tuple {
        &self.key
    }

    /// Whether keys equal to the bound tuple are included
    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }
}

/// A contiguous range of index keys
///
/// Open sides are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBound {
    lower: Option<RangeEnd>,
    upper: Option<RangeEnd>,
    equality: bool,
}

impl ScanBound {
    pub(crate) fn new(lower: Option<RangeEnd>, upper: Option<RangeEnd>, equality: bool) -> Self {
        ScanBound { lower, upper, equality }
    }

    /// A bound covering the whole index
    pub(crate) fn unbounded() -> Self {
        ScanBound { lower: None, upper: None, equality: false }
    }

    /// Lower end (`gt` or `gte`)
    pub fn lower(&self) -> Option<&RangeEnd> {
        self.lower.as_ref()
    }

    /// Upper end (`lt` or `lte`)
    pub fn upper(&self) -> Option<&RangeEnd> {
        self.upper.as_ref()
    }

    /// Whether the bound came from equality predicates only
    pub fn is_equality(&self) -> bool {
        self.equality
    }

    /// Whether a stored key lies inside the bound
    pub fn contains(&self, key: &Tuple) -> bool {
        let above = self.lower.as_ref().map_or(true, |end| match key.cmp(&end.key) {
            Ordering::Greater => true,
            Ordering::Equal => end.inclusive,
            Ordering::Less => false,
        });

        let below = self.upper.as_ref().map_or(true, |end| match key.cmp(&end.key) {
            Ordering::Less => true,
            Ordering::Equal => end.inclusive,
            Ordering::Greater => false,
        });

        above && below
    }

    /// Resolve the bound against keys of `width` components
    ///
    /// Short bound tuples are padded the same way the compiler pads them:
    /// inclusive lower and exclusive upper ends with MIN, the others with MAX.
    /// Returns `None` when the range is empty.
    pub(crate) fn key_range(&self, width: usize) -> Option<(Bound<Tuple>, Bound<Tuple>)> {
        let lower = match &self.lower {
            None => Bound::Unbounded,
            Some(end) if end.inclusive => Bound::Included(end.key.clone().padded(width, KeyPart::Min)),
            Some(end) => Bound::Excluded(end.key.clone().padded(width, KeyPart::Max)),
        };

        let upper = match &self.upper {
            None => Bound::Unbounded,
            Some(end) if end.inclusive => Bound::Included(end.key.clone().padded(width, KeyPart::Max)),
            Some(end) => Bound::Excluded(end.key.clone().padded(width, KeyPart::Min)),
        };

        // BTreeMap::range panics on inverted or empty exclusive ranges
        let empty = match (&lower, &upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        };

        if empty {
            None
        } else {
            Some((lower, upper))
        }
    }
}
