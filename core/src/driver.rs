//! Storage driver contract
//!
//! Any backing engine implements [`Driver`] and [`DriverTx`]. Every call
//! returns an [`Effect`]: engines that answer immediately return
//! `Effect::Continue`, engines that must wait return `Effect::Suspend`.
//! Errors that can be detected before any work starts are returned directly.

use crate::bounds::ScanBound;
use crate::effect::Effect;
use crate::error::Result;
use crate::models::Record;
use crate::schema::TableDef;

/// A pluggable storage engine
pub trait Driver: Send + Sync {
    /// Short engine name used in logs
    fn name(&self) -> &'static str;

    /// Create storage for the given tables
    fn load_tables(&self, tables: &[TableDef]) -> Result<Effect<()>>;

    /// Read records inside OR-ed bounds of one index
    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>>;

    /// Insert records
    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Replace existing records
    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Delete records by id
    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>>;

    /// Open a write transaction
    fn begin_tx(&self) -> Result<Effect<Box<dyn DriverTx>>>;
}

/// A driver-level transaction
///
/// Reads see the transaction's own writes; nothing is visible outside it
/// before `commit`.
pub trait DriverTx: Send + Sync {
    /// Transaction identifier
    fn id(&self) -> u64;

    /// Read records inside OR-ed bounds of one index
    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>>;

    /// Insert records
    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Replace existing records
    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>>;

    /// Delete records by id
    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>>;

    /// Publish every write
    fn commit(&self) -> Result<Effect<()>>;

    /// Discard every write
    fn rollback(&self) -> Result<Effect<()>>;
}
