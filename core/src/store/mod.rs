//! Index-backed table storage
//!
//! This module provides the per-table collection of ordered indexes plus
//! the id lookup, and the in-memory drivers built on top of it.

mod index;
mod memory;
mod deferred;

pub use index::OrderedIndex;
pub use memory::{MemoryDriver, MemoryTx};
pub use deferred::{DeferredDriver, DeferredTx};

use std::collections::{BTreeMap, HashMap, HashSet};
use log::debug;

use crate::bounds::ScanBound;
use crate::error::{StoreError, Result};
use crate::models::Record;
use crate::schema::TableDef;

/// Storage for one table
///
/// Every index and the id lookup are written by the same routine, so a
/// record is either present everywhere or nowhere.
#[derive(Debug, Clone)]
pub struct TableStore {
    /// Table definition
    def: TableDef,

    /// Indexes by name
    indexes: BTreeMap<String, OrderedIndex>,

    /// Id to current record
    rows: HashMap<String, Record>,
}

impl TableStore {
    /// Create an empty table
    pub fn new(def: TableDef) -> Self {
        let indexes = def
            .indexes()
            .map(|index| (index.name().to_string(), OrderedIndex::new(index.clone())))
            .collect();

        TableStore {
            def,
            indexes,
            rows: HashMap::new(),
        }
    }

    /// Table definition
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no records
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Current record for an id
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.rows.get(id)
    }

    /// Look up an index by name
    pub fn index(&self, name: &str) -> Result<&OrderedIndex> {
        self.indexes.get(name).ok_or_else(|| StoreError::UnknownIndex {
            table: self.def.name().to_string(),
            index: name.to_string(),
        })
    }

    /// Store a record, replacing any record with the same id
    fn write(&mut self, record: &Record) {
        if let Some(previous) = self.rows.remove(&record.id) {
            for index in self.indexes.values_mut() {
                index.remove(&previous);
            }
        }

        for index in self.indexes.values_mut() {
            index.put(record);
        }

        self.rows.insert(record.id.clone(), record.clone());
    }

    /// Insert records; an existing id is replaced
    pub fn insert(&mut self, records: &[Record]) {
        for record in records {
            self.write(record);
        }
    }

    /// Replace existing records
    ///
    /// Fails without writing anything if any id is not stored.
    pub fn update(&mut self, records: &[Record]) -> Result<()> {
        if let Some(missing) = records.iter().find(|r| !self.rows.contains_key(&r.id)) {
            return Err(StoreError::NoPreviousRecord {
                table: self.def.name().to_string(),
                id: missing.id.clone(),
            });
        }

        for record in records {
            self.write(record);
        }

        Ok(())
    }

    /// Delete records by id, returning the ones that existed
    pub fn delete(&mut self, ids: &[String]) -> Vec<Record> {
        let mut removed = Vec::new();

        for id in ids {
            if let Some(previous) = self.rows.remove(id) {
                for index in self.indexes.values_mut() {
                    index.remove(&previous);
                }
                removed.push(previous);
            }
        }

        removed
    }

    /// Scan an index with OR-ed bounds
    ///
    /// Results follow bound order, then key order, without repeating an id.
    pub fn scan(&self, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Vec<Record>> {
        let index = self.index(index)?;
        let limit = limit.unwrap_or(usize::MAX);

        let mut seen = HashSet::new();
        let mut results = Vec::new();

        if limit == 0 {
            return Ok(results);
        }

        'bounds: for bound in bounds {
            for record in index.range(bound) {
                if seen.insert(record.id.as_str()) {
                    results.push(record.clone());
                    if results.len() >= limit {
                        break 'bounds;
                    }
                }
            }
        }

        Ok(results)
    }
}

/// All tables held by a driver
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<String, TableStore>,
}

impl TableSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage for tables that do not exist yet
    pub fn load(&mut self, defs: &[TableDef]) {
        for def in defs {
            if !self.tables.contains_key(def.name()) {
                debug!("Creating storage for table {}", def.name());
                self.tables.insert(def.name().to_string(), TableStore::new(def.clone()));
            }
        }
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> Result<&TableStore> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    /// Look up a table for writing
    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableStore> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    /// Replace a table wholesale
    pub(crate) fn replace(&mut self, table: TableStore) {
        self.tables.insert(table.def().name().to_string(), table);
    }

    /// Table names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{compile_bounds, WhereClause};
    use crate::models::Value;
    use crate::schema::{declare_table, IndexSpec};
    use proptest::prelude::*;

    fn books() -> TableStore {
        let def = declare_table("books")
            .with_indexes([
                ("ids", IndexSpec::equality(["id"])),
                ("by_author", IndexSpec::range(["author", "year"])),
                ("by_year", IndexSpec::range(["year"])),
            ])
            .unwrap();

        TableStore::new(def)
    }

    fn book(id: &str, author: &str, year: i32) -> Record {
        Record::new(id).with("author", author).with("year", year)
    }

    fn scan(table: &TableStore, index: &str, clauses: &[WhereClause], limit: Option<usize>) -> Vec<String> {
        let columns = table.def().index(index).unwrap().columns().to_vec();
        let bounds = compile_bounds(&columns, clauses).unwrap();

        table.scan(index, &bounds, limit).unwrap().into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut table = books();
        table.insert(&[book("b1", "Herbert", 1965)]);

        assert_eq!(scan(&table, "ids", &[WhereClause::new().eq("id", "b1")], None), vec!["b1"]);

        table.delete(&["b1".to_string()]);
        assert!(scan(&table, "ids", &[WhereClause::new().eq("id", "b1")], None).is_empty());
    }

    #[test]
    fn test_insert_then_update_and_delete() {
        let mut table = books();

        // The id lookup is written together with the indexes
        table.insert(&[book("b1", "Herbert", 1965)]);
        table.update(&[book("b1", "Herbert", 1966)]).unwrap();
        assert_eq!(table.get("b1").and_then(|r| r.get("year")), Some(&Value::from(1966)));

        let removed = table.delete(&["b1".to_string()]);
        assert_eq!(removed.len(), 1);
        assert!(table.is_empty());

        for index in ["ids", "by_author", "by_year"] {
            assert!(table.index(index).unwrap().is_empty());
        }
    }

    #[test]
    fn test_update_moves_keys_in_every_index() {
        let mut table = books();
        table.insert(&[book("b1", "Herbert", 1965), book("b2", "Le Guin", 1969)]);
        table.update(&[book("b1", "Herbert", 1984)]).unwrap();

        assert!(scan(&table, "by_year", &[WhereClause::new().eq("year", 1965)], None).is_empty());
        assert_eq!(scan(&table, "by_year", &[WhereClause::new().eq("year", 1984)], None), vec!["b1"]);
        assert_eq!(scan(&table, "by_author", &[WhereClause::new().eq("author", "Herbert").gt("year", 1980)], None), vec!["b1"]);
        assert_eq!(table.index("by_year").unwrap().len(), 2);
    }

    #[test]
    fn test_update_missing_writes_nothing() {
        let mut table = books();
        table.insert(&[book("b1", "Herbert", 1965)]);

        let err = table.update(&[book("b1", "Herbert", 1970), book("zz", "Nobody", 2000)]).unwrap_err();

        assert!(matches!(err, StoreError::NoPreviousRecord { ref id, .. } if id == "zz"));
        assert_eq!(table.get("b1").and_then(|r| r.get("year")), Some(&Value::from(1965)));
    }

    #[test]
    fn test_noops() {
        let mut table = books();
        table.insert(&[]);
        table.update(&[]).unwrap();

        // Deleting an absent id is silent
        assert!(table.delete(&["missing".to_string()]).is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_existing_id_replaces() {
        let mut table = books();
        table.insert(&[book("b1", "Herbert", 1965)]);
        table.insert(&[book("b1", "Herbert", 1970)]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.index("by_year").unwrap().len(), 1);
    }

    #[test]
    fn test_scan_limit_and_or() {
        let mut table = books();
        table.insert(&[
            book("b1", "Herbert", 1965),
            book("b2", "Le Guin", 1969),
            book("b3", "Herbert", 1969),
            book("b4", "Banks", 1987),
        ]);

        let clauses = [WhereClause::new().eq("year", 1969), WhereClause::new().gte("year", 1965)];

        // Clause order first, repeated ids dropped
        assert_eq!(scan(&table, "by_year", &clauses, None), vec!["b2", "b3", "b1", "b4"]);
        assert_eq!(scan(&table, "by_year", &clauses, Some(3)), vec!["b2", "b3", "b1"]);
        assert!(scan(&table, "by_year", &clauses, Some(0)).is_empty());
    }

    #[test]
    fn test_unknown_index() {
        let table = books();
        assert!(matches!(table.scan("by_title", &[], None), Err(StoreError::UnknownIndex { .. })));

        let tables = TableSet::new();
        assert!(matches!(tables.table("books"), Err(StoreError::UnknownTable(_))));
    }

    proptest! {
        #[test]
        fn prop_indexes_agree_after_updates(updates in proptest::collection::vec((0usize..5, 1950i32..1960), 1..40)) {
            let mut table = books();
            let initial: Vec<Record> = (0..5).map(|i| book(&format!("b{}", i), "A", 1950)).collect();
            table.insert(&initial);

            for (i, year) in updates {
                table.update(&[book(&format!("b{}", i), "A", year)]).unwrap();
            }

            // Every index holds exactly the current records
            for index in ["ids", "by_author", "by_year"] {
                let stored = table.index(index).unwrap();
                prop_assert_eq!(stored.len(), 5);
                for record in stored.iter() {
                    prop_assert_eq!(Some(record), table.get(&record.id));
                }
            }
        }
    }
}
