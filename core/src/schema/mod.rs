//! Table and index declarations
//!
//! This module provides the immutable table definitions the store is built
//! from, the serializable form used by configuration files, and the
//! catalog that resolves table and index names.

mod validator;

pub use validator::{DeclarationError, SchemaValidator, ValidationResult};

use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use log::debug;

use crate::error::{StoreError, Result};
use crate::models::{Record, ID_COLUMN};
use crate::tuple::Tuple;

/// Kind of index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact-match lookups only
    Equality,

    /// Ordered, supports range predicates
    Range,
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            IndexKind::Equality => write!(f, "equality"),
            IndexKind::Range => write!(f, "range"),
        }
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equality" | "eq" | "hash" => Ok(IndexKind::Equality),
            "range" | "btree" => Ok(IndexKind::Range),
            other => Err(other.to_string()),
        }
    }
}

/// Serializable index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index kind, e.g. "equality" or "range"
    pub kind: String,

    /// Indexed columns, most significant first
    pub columns: Vec<String>,
}

impl IndexSpec {
    /// Declare an equality index
    pub fn equality<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexSpec {
            kind: IndexKind::Equality.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Declare a range index
    pub fn range<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexSpec {
            kind: IndexKind::Range.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Serializable table declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name
    pub name: String,

    /// Indexes by name
    pub indexes: BTreeMap<String, IndexSpec>,
}

/// A validated index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    kind: IndexKind,
    columns: Vec<String>,
    key_columns: Vec<String>,
}

impl IndexDef {
    pub(crate) fn new(name: String, kind: IndexKind, columns: Vec<String>) -> Self {
        // Every key ends with the id so that keys are unique per record
        let mut key_columns = columns.clone();
        if key_columns.last().map(String::as_str) != Some(ID_COLUMN) {
            key_columns.push(ID_COLUMN.to_string());
        }

        IndexDef { name, kind, columns, key_columns }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index kind
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Declared columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns making up the stored key: the declared columns, then `id`
    /// unless it is already the last declared column
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Number of components in a stored key
    pub fn key_width(&self) -> usize {
        self.key_columns.len()
    }

    /// Build the key of a record in this index
    pub fn key_for(&self, record: &Record) -> Tuple {
        Tuple::from_values(self.key_columns.iter().map(|column| record.column_value(column)))
    }
}

/// A validated table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    indexes: BTreeMap<String, IndexDef>,
    id_index: IndexDef,
}

impl TableDef {
    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an index by name
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.get(name)
    }

    /// All indexes, ordered by name
    pub fn indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.values()
    }

    /// The equality index on `id`
    pub fn id_index(&self) -> &IndexDef {
        &self.id_index
    }

    /// Convert back into the serializable form
    pub fn to_spec(&self) -> TableSpec {
        TableSpec {
            name: self.name.clone(),
            indexes: self
                .indexes
                .values()
                .map(|index| {
                    (
                        index.name.clone(),
                        IndexSpec { kind: index.kind.to_string(), columns: index.columns.clone() },
                    )
                })
                .collect(),
        }
    }
}

impl TryFrom<TableSpec> for TableDef {
    type Error = DeclarationError;

    fn try_from(spec: TableSpec) -> ValidationResult<Self> {
        declare_table(spec.name).with_indexes(spec.indexes)
    }
}

/// Builder returned by [`declare_table`]
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
}

impl TableBuilder {
    /// Attach the index declarations and validate the table
    pub fn with_indexes<I, N>(self, indexes: I) -> ValidationResult<TableDef>
    where
        I: IntoIterator<Item = (N, IndexSpec)>,
        N: Into<String>,
    {
        if self.name.is_empty() {
            return Err(DeclarationError::EmptyName("table"));
        }

        let mut defs = BTreeMap::new();
        for (name, spec) in indexes {
            let name = name.into();
            let index = SchemaValidator::validate_index(&self.name, &name, &spec)?;

            if defs.insert(name.clone(), index).is_some() {
                return Err(DeclarationError::DuplicateIndex { table: self.name, index: name });
            }
        }

        let id_index_name = SchemaValidator::find_id_index(&self.name, defs.values())?;
        let id_index = defs
            .get(&id_index_name)
            .cloned()
            .ok_or_else(|| DeclarationError::MissingIdIndex(self.name.clone()))?;

        debug!("Declared table {} with {} indexes", self.name, defs.len());

        Ok(TableDef { name: self.name, indexes: defs, id_index })
    }
}

/// Start declaring a table
pub fn declare_table(name: impl Into<String>) -> TableBuilder {
    TableBuilder { name: name.into() }
}

/// Set of declared tables
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, TableDef>,
}

impl Catalog {
    /// Build a catalog from validated tables
    pub fn new(tables: impl IntoIterator<Item = TableDef>) -> ValidationResult<Self> {
        let mut catalog = Catalog::default();
        for table in tables {
            catalog.add(table)?;
        }
        Ok(catalog)
    }

    /// Build a catalog from serializable declarations
    pub fn from_specs(specs: &[TableSpec]) -> ValidationResult<Self> {
        let tables = specs
            .iter()
            .cloned()
            .map(TableDef::try_from)
            .collect::<ValidationResult<Vec<_>>>()?;

        Self::new(tables)
    }

    /// Add a table; names must be unique
    pub fn add(&mut self, table: TableDef) -> ValidationResult<()> {
        if self.tables.contains_key(table.name()) {
            return Err(DeclarationError::DuplicateTable(table.name().to_string()));
        }

        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> Result<&TableDef> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    /// Look up an index of a table
    pub fn index(&self, table: &str, index: &str) -> Result<&IndexDef> {
        self.table(table)?.index(index).ok_or_else(|| StoreError::UnknownIndex {
            table: table.to_string(),
            index: index.to_string(),
        })
    }

    /// Whether a table is declared
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All tables, in no particular order
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books() -> TableDef {
        declare_table("books")
            .with_indexes([
                ("ids", IndexSpec::equality(["id"])),
                ("by_author", IndexSpec::range(["author", "title"])),
            ])
            .unwrap()
    }

    #[test]
    fn test_declare_table() {
        let table = books();

        assert_eq!(table.name(), "books");
        assert_eq!(table.id_index().name(), "ids");
        assert_eq!(table.indexes().count(), 2);

        let index = table.index("by_author").unwrap();
        assert_eq!(index.key_columns(), &["author".to_string(), "title".to_string(), "id".to_string()]);
    }

    #[test]
    fn test_key_for() {
        let table = books();
        let record = Record::new("b1").with("author", "Herbert");

        let key = table.index("by_author").unwrap().key_for(&record);

        // Missing title keys as null
        assert_eq!(key, Tuple::from_values(vec!["Herbert".into(), crate::models::Value::Null, "b1".into()]));
    }

    #[test]
    fn test_index_kind_parsing() {
        assert_eq!("equality".parse::<IndexKind>(), Ok(IndexKind::Equality));
        assert_eq!("BTREE".parse::<IndexKind>(), Ok(IndexKind::Range));
        assert!("fulltext".parse::<IndexKind>().is_err());
    }

    #[test]
    fn test_missing_id_index() {
        let err = declare_table("notes")
            .with_indexes([("by_title", IndexSpec::range(["title"]))])
            .unwrap_err();

        assert_eq!(err, DeclarationError::MissingIdIndex("notes".to_string()));
    }

    #[test]
    fn test_spec_round_trip() {
        let table = books();
        let json = serde_json::to_string(&table.to_spec()).unwrap();
        let spec: TableSpec = serde_json::from_str(&json).unwrap();

        assert_eq!(TableDef::try_from(spec).unwrap(), table);
    }

    #[test]
    fn test_catalog() {
        let catalog = Catalog::new(vec![books()]).unwrap();

        assert!(catalog.has_table("books"));
        assert!(catalog.index("books", "by_author").is_ok());

        assert!(matches!(catalog.table("authors"), Err(StoreError::UnknownTable(_))));
        assert!(matches!(catalog.index("books", "by_year"), Err(StoreError::UnknownIndex { .. })));

        // Tables are declared once
        assert_eq!(
            Catalog::new(vec![books(), books()]).unwrap_err(),
            DeclarationError::DuplicateTable("books".to_string())
        );
    }
}
