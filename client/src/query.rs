//! Query builder for scanning tables
//!
//! This module provides a fluent builder that collects per-column
//! predicates and a result limit, and issues the scan on any scope.

use log::debug;
use tuplestore_core::effect::Effect;
use tuplestore_core::schema::Catalog;
use tuplestore_core::{Record, Scope, Value, WhereClause};

use crate::error::{ClientError, Result};

/// Fluent predicates on columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clause: WhereClause,
}

impl Filter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column == value`
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clause = self.clause.eq(column, value);
        self
    }

    /// Require `column < value`
    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clause = self.clause.lt(column, value);
        self
    }

    /// Require `column <= value`
    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clause = self.clause.lte(column, value);
        self
    }

    /// Require `column > value`
    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clause = self.clause.gt(column, value);
        self
    }

    /// Require `column >= value`
    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clause = self.clause.gte(column, value);
        self
    }

    /// The clause built so far
    pub fn into_clause(self) -> WhereClause {
        self.clause
    }
}

impl From<Filter> for WhereClause {
    fn from(filter: Filter) -> Self {
        filter.into_clause()
    }
}

/// A scan ready to be issued
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Table name
    pub table: String,

    /// Index name
    pub index: String,

    /// OR-ed clauses; empty means the whole index
    pub clauses: Vec<WhereClause>,

    /// Result limit
    pub limit: Option<usize>,
}

/// Query builder
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Table name
    table: String,

    /// Index name; the table's id index when unset
    index: Option<String>,

    /// OR-ed clauses
    clauses: Vec<WhereClause>,

    /// Result limit
    limit: Option<usize>,
}

impl Query {
    /// Start a query on a table
    pub fn table(table: &str) -> Self {
        Query {
            table: table.to_string(),
            index: None,
            clauses: Vec::new(),
            limit: None,
        }
    }

    /// Scan through the given index
    pub fn index(mut self, index: &str) -> Self {
        self.index = Some(index.to_string());
        self
    }

    /// Set the first clause
    pub fn filter(mut self, clause: impl Into<WhereClause>) -> Self {
        let clause = clause.into();
        match self.clauses.first_mut() {
            Some(first) => *first = clause,
            None => self.clauses.push(clause),
        }
        self
    }

    /// Add an alternative clause
    pub fn or(mut self, clause: impl Into<WhereClause>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    /// Return at most `limit` records
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Table this query reads
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Resolve the index and produce the scan to issue
    pub fn materialize(&self, catalog: &Catalog) -> Result<ScanRequest> {
        let table = catalog.table(&self.table)?;

        let index = match &self.index {
            Some(index) => index.clone(),
            None => table.id_index().name().to_string(),
        };

        if self.clauses.iter().any(WhereClause::is_empty) {
            return Err(ClientError::Query(format!(
                "Query on {}.{} has a clause without predicates",
                self.table, index
            )));
        }

        Ok(ScanRequest {
            table: self.table.clone(),
            index,
            clauses: self.clauses.clone(),
            limit: self.limit,
        })
    }

    /// Issue the scan on a scope
    pub fn scan<S: Scope + ?Sized>(&self, scope: &S) -> Result<Effect<Vec<Record>>> {
        let request = self.materialize(scope.catalog())?;
        debug!("Scanning {}.{} with {} clauses", request.table, request.index, request.clauses.len());

        let effect = if request.clauses.is_empty() {
            scope.scan_all(&request.table, &request.index, request.limit)?
        } else {
            scope.scan(&request.table, &request.index, &request.clauses, request.limit)?
        };

        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tuplestore_core::{declare_table, IndexSpec, MemoryDriver, Session, StoreError};

    fn session() -> Session {
        let books = declare_table("books")
            .with_indexes([
                ("ids", IndexSpec::equality(["id"])),
                ("by_author", IndexSpec::range(["author", "year"])),
            ])
            .unwrap();
        let session = Session::open_sync(Arc::new(MemoryDriver::new()), Catalog::new(vec![books]).unwrap()).unwrap();

        let records = vec![
            Record::new("b1").with("author", "Le Guin").with("year", 1969),
            Record::new("b2").with("author", "Le Guin").with("year", 1974),
            Record::new("b3").with("author", "Herbert").with("year", 1965),
        ];
        session.insert("books", &records).unwrap().wait().unwrap();
        session
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_materialize() {
        let session = session();
        let query = Query::table("books")
            .index("by_author")
            .filter(Filter::new().eq("author", "Le Guin").gte("year", 1970))
            .or(Filter::new().eq("author", "Herbert"))
            .limit(5);

        let request = query.materialize(session.catalog()).unwrap();
        assert_eq!(request.index, "by_author");
        assert_eq!(request.clauses.len(), 2);
        assert_eq!(request.clauses[0], WhereClause::new().eq("author", "Le Guin").gte("year", 1970));
        assert_eq!(request.limit, Some(5));

        // Without an index the id index is used
        let request = Query::table("books").materialize(session.catalog()).unwrap();
        assert_eq!(request.index, "ids");
    }

    #[test]
    fn test_filter_replaces_first_clause() {
        let query = Query::table("books")
            .filter(Filter::new().eq("author", "Herbert"))
            .filter(Filter::new().eq("author", "Le Guin"));

        let request = query.materialize(session().catalog()).unwrap();
        assert_eq!(request.clauses, vec![WhereClause::new().eq("author", "Le Guin")]);
    }

    #[test]
    fn test_scan() {
        let session = session();

        let found = Query::table("books")
            .index("by_author")
            .filter(Filter::new().eq("author", "Le Guin"))
            .or(Filter::new().eq("author", "Herbert"))
            .scan(&session)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(ids(&found), vec!["b1", "b2", "b3"]);

        let found = Query::table("books").index("by_author").limit(1).scan(&session).unwrap().wait().unwrap();
        assert_eq!(ids(&found), vec!["b3"]);
    }

    #[test]
    fn test_errors() {
        let session = session();

        let err = Query::table("authors").scan(&session).unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::UnknownTable(_))));

        let err = Query::table("books").filter(Filter::new()).scan(&session).unwrap_err();
        assert!(matches!(err, ClientError::Query(_)));

        let err = Query::table("books")
            .index("by_author")
            .filter(Filter::new().gt("year", 1970))
            .scan(&session)
            .unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Bounds(_))));
    }
}
