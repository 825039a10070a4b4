//! Ordered index
//!
//! One ordered tree per declared index, mapping key tuples to full records.

use std::collections::BTreeMap;

use crate::bounds::ScanBound;
use crate::models::Record;
use crate::schema::IndexDef;
use crate::tuple::Tuple;

/// An ordered index over one table
#[derive(Debug, Clone)]
pub struct OrderedIndex {
    /// Index definition
    def: IndexDef,

    /// Key tuple to record
    entries: BTreeMap<Tuple, Record>,
}

impl OrderedIndex {
    /// Create an empty index
    pub fn new(def: IndexDef) -> Self {
        OrderedIndex {
            def,
            entries: BTreeMap::new(),
        }
    }

    /// Index definition
    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a record under its key
    pub fn put(&mut self, record: &Record) {
        self.entries.insert(self.def.key_for(record), record.clone());
    }

    /// Remove the entry keyed by a stored record
    pub fn remove(&mut self, record: &Record) -> Option<Record> {
        self.entries.remove(&self.def.key_for(record))
    }

    /// Records inside a bound, in key order
    pub fn range<'a>(&'a self, bound: &ScanBound) -> impl Iterator<Item = &'a Record> + 'a {
        bound
            .key_range(self.def.key_width())
            .into_iter()
            .flat_map(move |range| self.entries.range(range))
            .map(|(_, record)| record)
    }

    /// All records, in key order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.entries.values()
    }

    /// Keys currently stored, in order
    pub fn keys(&self) -> impl Iterator<Item = &Tuple> {
        self.entries.keys()
    }
}
