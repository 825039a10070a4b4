//! Sessions and scopes
//!
//! A [`Scope`] is anything scripts can read and write through: the session
//! itself (auto-committed calls) or an open [`Transaction`]. Both resolve
//! names against the same catalog and compile predicates the same way.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use log::{debug, info};

use crate::bounds::{compile_bounds, BoundsError, ScanBound, WhereClause};
use crate::config::StoreConfig;
use crate::driver::Driver;
use crate::error::Result;
use crate::models::Record;
use crate::schema::{Catalog, IndexKind};
use super::{Effect, Transaction};

/// Something scripts can read and write through
pub trait Scope: Send + Sync {
    /// Declared tables
    fn catalog(&self) -> &Catalog;

    /// Scan one index with OR-ed clauses
    ///
    /// An empty clause list matches nothing.
    fn scan(&self, table: &str, index: &str, clauses: &[WhereClause], limit: Option<usize>) -> Result<Effect<Vec<Record>>>;

    /// Walk a whole index in key order
    fn scan_all(&self, table: &str, index: &str, limit: Option<usize>) -> Result<Effect<Vec<Record>>>;

    /// Insert records
    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Replace existing records
    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Delete records by id
    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>>;

    /// The open transaction behind this scope, if any
    fn transaction(&self) -> Option<&Transaction> {
        None
    }

    /// Fetch current records by id through the table's id index
    ///
    /// Ids with no record are left out.
    fn get_many(&self, table: &str, ids: &[String]) -> Result<Effect<Vec<Record>>> {
        let index = self.catalog().table(table)?.id_index().name().to_string();
        let clauses: Vec<WhereClause> = ids
            .iter()
            .map(|id| WhereClause::new().eq(crate::models::ID_COLUMN, id.as_str()))
            .collect();

        // Bypasses any default limit; each id matches at most once
        self.scan(table, &index, &clauses, Some(ids.len()))
    }
}

/// Resolve an index and compile clauses against it
pub(crate) fn plan_scan(catalog: &Catalog, table: &str, index: &str, clauses: &[WhereClause]) -> Result<Vec<ScanBound>> {
    let def = catalog.index(table, index)?;

    let bounds = compile_bounds(def.columns(), clauses).map_err(|e| {
        debug!("Rejected scan on {}.{}: {}", table, index, e);
        e
    })?;

    if def.kind() == IndexKind::Equality && bounds.iter().any(|bound| !bound.is_equality()) {
        debug!("Rejected range scan on equality index {}.{}", table, index);
        return Err(BoundsError::RangeOnEqualityIndex { index: index.to_string() }.into());
    }

    Ok(bounds)
}

/// Entry point for running scripts against a driver
#[derive(Clone)]
pub struct Session {
    /// Backing engine
    driver: Arc<dyn Driver>,

    /// Declared tables
    catalog: Arc<Catalog>,

    /// Limit applied when a scan passes none
    default_scan_limit: Option<usize>,
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Session")
            .field("driver", &self.driver.name())
            .field("tables", &self.catalog.table_count())
            .field("default_scan_limit", &self.default_scan_limit)
            .finish()
    }
}

impl Session {
    /// Create a session; tables are not loaded yet
    pub fn new(driver: Arc<dyn Driver>, catalog: Catalog) -> Self {
        Session {
            driver,
            catalog: Arc::new(catalog),
            default_scan_limit: None,
        }
    }

    /// Create a session from configuration, declaring its tables
    pub fn from_config(driver: Arc<dyn Driver>, config: &StoreConfig) -> Result<Self> {
        let catalog = Catalog::from_specs(&config.tables)?;
        Ok(Self::new(driver, catalog).with_default_scan_limit(config.default_scan_limit))
    }

    /// Set the limit used by scans that pass none
    pub fn with_default_scan_limit(mut self, limit: Option<usize>) -> Self {
        self.default_scan_limit = limit;
        self
    }

    /// Create a session and load its tables, without a runtime
    pub fn open_sync(driver: Arc<dyn Driver>, catalog: Catalog) -> Result<Self> {
        let session = Self::new(driver, catalog);
        session.load_tables()?.wait()?;
        Ok(session)
    }

    /// Create a session and load its tables
    pub async fn open_async(driver: Arc<dyn Driver>, catalog: Catalog) -> Result<Self> {
        let session = Self::new(driver, catalog);
        session.load_tables()?.resolve().await?;
        Ok(session)
    }

    /// Backing engine
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub(crate) fn shared_catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    /// Limit used by scans that pass none
    pub fn default_scan_limit(&self) -> Option<usize> {
        self.default_scan_limit
    }

    /// Create driver storage for every declared table
    pub fn load_tables(&self) -> Result<Effect<()>> {
        let tables: Vec<_> = self.catalog.tables().cloned().collect();
        info!("Loading {} tables through {} driver", tables.len(), self.driver.name());

        self.driver.load_tables(&tables)
    }

    /// Open a transaction
    pub fn begin_tx(&self) -> Result<Effect<Transaction>> {
        let catalog = self.catalog.clone();
        let limit = self.default_scan_limit;

        Ok(self.driver.begin_tx()?.map(move |tx| Transaction::new(tx, catalog, limit)))
    }
}

impl Scope for Session {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn scan(&self, table: &str, index: &str, clauses: &[WhereClause], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        let bounds = plan_scan(&self.catalog, table, index, clauses)?;
        self.driver.scan(table, index, &bounds, limit.or(self.default_scan_limit))
    }

    fn scan_all(&self, table: &str, index: &str, limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        self.catalog.index(table, index)?;
        self.driver.scan(table, index, &[ScanBound::unbounded()], limit.or(self.default_scan_limit))
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.driver.insert(table, records)
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.driver.update(table, records)
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.driver.delete(table, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::schema::{declare_table, IndexSpec};
    use crate::store::MemoryDriver;

    fn session() -> Session {
        let books = declare_table("books")
            .with_indexes([
                ("ids", IndexSpec::equality(["id"])),
                ("by_year", IndexSpec::range(["year"])),
            ])
            .unwrap();

        Session::open_sync(Arc::new(MemoryDriver::new()), Catalog::new(vec![books]).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let session = session();
        session.insert("books", &[Record::new("b1").with("year", 1965)]).unwrap().wait().unwrap();

        let found = session.get_many("books", &["b1".to_string(), "zz".to_string()]).unwrap().wait().unwrap();
        assert_eq!(found.len(), 1);

        session.delete("books", &["b1".to_string()]).unwrap().wait().unwrap();
        let found = session.get_many("books", &["b1".to_string()]).unwrap().wait().unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_range_on_equality_index() {
        let session = session();
        let err = session.scan("books", "ids", &[WhereClause::new().gt("id", "a")], None).unwrap_err();

        assert!(matches!(err, StoreError::Bounds(BoundsError::RangeOnEqualityIndex { .. })));
    }

    #[test]
    fn test_bad_clause_never_scans() {
        let session = session();
        let err = session.scan("books", "by_year", &[WhereClause::new().eq("title", "x")], None).unwrap_err();

        assert!(err.is_bounds_error());
    }

    #[test]
    fn test_lookup_errors() {
        let session = session();

        assert!(matches!(session.insert("authors", &[]), Err(StoreError::UnknownTable(_))));
        assert!(matches!(session.scan_all("books", "by_title", None), Err(StoreError::UnknownIndex { .. })));
    }

    #[test]
    fn test_scan_all_and_default_limit() {
        let session = session().with_default_scan_limit(Some(2));
        let records: Vec<Record> = (0..5).map(|i| Record::new(format!("b{}", i)).with("year", 2000 - i)).collect();
        session.insert("books", &records).unwrap().wait().unwrap();

        let all = session.scan_all("books", "by_year", Some(10)).unwrap().wait().unwrap();
        let years: Vec<f64> = all.iter().filter_map(|r| r.get("year").and_then(|v| v.as_number())).collect();
        assert_eq!(years, vec![1996.0, 1997.0, 1998.0, 1999.0, 2000.0]);

        assert_eq!(session.scan_all("books", "by_year", None).unwrap().wait().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_clause_list_matches_nothing() {
        let session = session();
        session.insert("books", &[Record::new("b1").with("year", 1965)]).unwrap().wait().unwrap();

        assert!(session.scan("books", "by_year", &[], None).unwrap().wait().unwrap().is_empty());
    }
}
