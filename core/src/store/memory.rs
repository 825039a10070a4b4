//! In-memory driver
//!
//! Tables live behind one lock. Transactions stage their writes on private
//! copies of the tables they touch and replay them onto the shared tables at
//! commit, so a failed replay leaves the shared tables untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use log::{debug, info, warn};

use crate::bounds::ScanBound;
use crate::driver::{Driver, DriverTx};
use crate::effect::Effect;
use crate::error::{StoreError, Result};
use crate::models::Record;
use crate::schema::TableDef;
use super::{TableSet, TableStore};

/// Shared driver state
#[derive(Debug, Default)]
struct MemoryState {
    /// Committed tables
    tables: TableSet,

    /// Currently open write transaction
    open_tx: Option<u64>,

    /// Next transaction identifier
    next_tx_id: u64,
}

/// Driver keeping every table in memory
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    /// Shared state
    state: Arc<RwLock<MemoryState>>,

    /// Reject a second open transaction
    single_writer: bool,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    /// Create an empty single-writer driver
    pub fn new() -> Self {
        MemoryDriver {
            state: Arc::new(RwLock::new(MemoryState { next_tx_id: 1, ..Default::default() })),
            single_writer: true,
        }
    }

    /// Allow or forbid several open transactions
    pub fn with_single_writer(mut self, single_writer: bool) -> Self {
        self.single_writer = single_writer;
        self
    }

    /// Create storage for tables
    pub fn load_tables_now(&self, tables: &[TableDef]) -> Result<()> {
        let mut state = self.state.write()
            .map_err(|e| StoreError::State(format!("Failed to write tables: {}", e)))?;

        state.tables.load(tables);
        info!("Loaded {} tables into memory driver", tables.len());

        Ok(())
    }

    /// Scan committed data
    pub fn scan_now(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Vec<Record>> {
        let state = self.state.read()
            .map_err(|e| StoreError::State(format!("Failed to read tables: {}", e)))?;

        state.tables.table(table)?.scan(index, bounds, limit)
    }

    /// Insert outside any transaction
    pub fn insert_now(&self, table: &str, records: &[Record]) -> Result<()> {
        let mut state = self.state.write()
            .map_err(|e| StoreError::State(format!("Failed to write tables: {}", e)))?;

        state.tables.table_mut(table)?.insert(records);
        Ok(())
    }

    /// Update outside any transaction
    pub fn update_now(&self, table: &str, records: &[Record]) -> Result<()> {
        let mut state = self.state.write()
            .map_err(|e| StoreError::State(format!("Failed to write tables: {}", e)))?;

        state.tables.table_mut(table)?.update(records)
    }

    /// Delete outside any transaction
    pub fn delete_now(&self, table: &str, ids: &[String]) -> Result<()> {
        let mut state = self.state.write()
            .map_err(|e| StoreError::State(format!("Failed to write tables: {}", e)))?;

        state.tables.table_mut(table)?.delete(ids);
        Ok(())
    }

    /// Open a transaction
    pub fn begin_tx_now(&self) -> Result<MemoryTx> {
        let mut state = self.state.write()
            .map_err(|e| StoreError::State(format!("Failed to write transaction state: {}", e)))?;

        if self.single_writer {
            if let Some(open) = state.open_tx {
                warn!("Rejecting new transaction while transaction {} is open", open);
                return Err(StoreError::TransactionAlreadyOpen(open));
            }
        }

        let id = state.next_tx_id;
        state.next_tx_id += 1;
        state.open_tx = Some(id);

        debug!("Began transaction {}", id);

        Ok(MemoryTx {
            inner: Arc::new(TxInner {
                id,
                driver: self.state.clone(),
                state: Mutex::new(TxState::default()),
            }),
        })
    }

    /// Identifier of the open transaction, if any
    pub fn open_transaction(&self) -> Result<Option<u64>> {
        let state = self.state.read()
            .map_err(|e| StoreError::State(format!("Failed to read transaction state: {}", e)))?;

        Ok(state.open_tx)
    }

    /// Number of committed records in a table
    pub fn record_count(&self, table: &str) -> Result<usize> {
        let state = self.state.read()
            .map_err(|e| StoreError::State(format!("Failed to read tables: {}", e)))?;

        Ok(state.tables.table(table)?.len())
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_tables(&self, tables: &[TableDef]) -> Result<Effect<()>> {
        self.load_tables_now(tables).map(Effect::Continue)
    }

    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        self.scan_now(table, index, bounds, limit).map(Effect::Continue)
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.insert_now(table, records).map(Effect::Continue)
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.update_now(table, records).map(Effect::Continue)
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        self.delete_now(table, ids).map(Effect::Continue)
    }

    fn begin_tx(&self) -> Result<Effect<Box<dyn DriverTx>>> {
        let tx: Box<dyn DriverTx> = Box::new(self.begin_tx_now()?);
        Ok(Effect::Continue(tx))
    }
}

/// A staged write, replayed at commit
#[derive(Debug, Clone)]
enum Write {
    Insert(String, Vec<Record>),
    Update(String, Vec<Record>),
    Delete(String, Vec<String>),
}

impl Write {
    fn table(&self) -> &str {
        match self {
            Write::Insert(table, _) | Write::Update(table, _) | Write::Delete(table, _) => table,
        }
    }

    fn apply(&self, table: &mut TableStore) -> Result<()> {
        match self {
            Write::Insert(_, records) => table.insert(records),
            Write::Update(_, records) => table.update(records)?,
            Write::Delete(_, ids) => {
                table.delete(ids);
            }
        }
        Ok(())
    }
}

/// Transaction-private state
#[derive(Debug, Default)]
struct TxState {
    /// Private copies of the tables written so far
    staged: HashMap<String, TableStore>,

    /// Writes in issue order
    log: Vec<Write>,

    /// Committed or rolled back
    finished: bool,
}

#[derive(Debug)]
struct TxInner {
    id: u64,
    driver: Arc<RwLock<MemoryState>>,
    state: Mutex<TxState>,
}

impl Drop for TxInner {
    fn drop(&mut self) {
        let finished = self.state.get_mut().map(|state| state.finished).unwrap_or(true);
        if finished {
            return;
        }

        // Abandoned without commit or rollback
        if let Ok(mut driver) = self.driver.write() {
            if driver.open_tx == Some(self.id) {
                warn!("Transaction {} dropped while open; discarding its writes", self.id);
                driver.open_tx = None;
            }
        }
    }
}

/// Transaction on a [`MemoryDriver`]
#[derive(Debug, Clone)]
pub struct MemoryTx {
    inner: Arc<TxInner>,
}

impl MemoryTx {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TxState>> {
        let state = self.inner.state.lock()
            .map_err(|e| StoreError::State(format!("Failed to lock transaction {}: {}", self.inner.id, e)))?;

        if state.finished {
            return Err(StoreError::TransactionFinished(self.inner.id));
        }

        Ok(state)
    }

    /// Record a write and apply it to the private copy of its table
    fn stage(&self, write: Write) -> Result<()> {
        let mut state = self.lock()?;
        let name = write.table().to_string();

        if !state.staged.contains_key(&name) {
            let driver = self.inner.driver.read()
                .map_err(|e| StoreError::State(format!("Failed to read tables: {}", e)))?;
            let copy = driver.tables.table(&name)?.clone();
            state.staged.insert(name.clone(), copy);
        }

        if let Some(table) = state.staged.get_mut(&name) {
            write.apply(table)?;
        }

        state.log.push(write);
        Ok(())
    }

    /// Release the driver's open-transaction slot
    fn release(&self) -> Result<()> {
        let mut driver = self.inner.driver.write()
            .map_err(|e| StoreError::State(format!("Failed to write transaction state: {}", e)))?;

        if driver.open_tx == Some(self.inner.id) {
            driver.open_tx = None;
        }

        Ok(())
    }

    /// Scan, seeing this transaction's own writes
    pub fn scan_now(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Vec<Record>> {
        let state = self.lock()?;

        if let Some(staged) = state.staged.get(table) {
            return staged.scan(index, bounds, limit);
        }

        let driver = self.inner.driver.read()
            .map_err(|e| StoreError::State(format!("Failed to read tables: {}", e)))?;

        driver.tables.table(table)?.scan(index, bounds, limit)
    }

    /// Stage an insert
    pub fn insert_now(&self, table: &str, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            drop(self.lock()?);
            return Ok(());
        }
        self.stage(Write::Insert(table.to_string(), records.to_vec()))
    }

    /// Stage an update
    pub fn update_now(&self, table: &str, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            drop(self.lock()?);
            return Ok(());
        }
        self.stage(Write::Update(table.to_string(), records.to_vec()))
    }

    /// Stage a delete
    pub fn delete_now(&self, table: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            drop(self.lock()?);
            return Ok(());
        }
        self.stage(Write::Delete(table.to_string(), ids.to_vec()))
    }

    /// Replay every staged write onto the shared tables
    pub fn commit_now(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.finished = true;
        let log = std::mem::take(&mut state.log);
        state.staged.clear();
        drop(state);

        let result = self.replay(&log);
        self.release()?;

        match &result {
            Ok(()) => info!("Committed transaction {} ({} writes)", self.inner.id, log.len()),
            Err(e) => warn!("Commit of transaction {} failed: {}", self.inner.id, e),
        }

        result
    }

    fn replay(&self, log: &[Write]) -> Result<()> {
        let mut driver = self.inner.driver.write()
            .map_err(|e| StoreError::State(format!("Failed to write tables: {}", e)))?;

        // Apply to copies first so a failing write publishes nothing
        let mut copies: HashMap<String, TableStore> = HashMap::new();
        for write in log {
            if !copies.contains_key(write.table()) {
                let copy = driver.tables.table(write.table())?.clone();
                copies.insert(write.table().to_string(), copy);
            }

            if let Some(table) = copies.get_mut(write.table()) {
                write.apply(table)?;
            }
        }

        for (_, table) in copies {
            driver.tables.replace(table);
        }

        Ok(())
    }

    /// Discard every staged write
    pub fn rollback_now(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.finished = true;
        state.log.clear();
        state.staged.clear();
        drop(state);

        self.release()?;
        info!("Rolled back transaction {}", self.inner.id);

        Ok(())
    }
}

impl DriverTx for MemoryTx {
    fn id(&self) -> u64 {
        self.inner.id
    }

    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        self.scan_now(table, index, bounds, limit).map(Effect::Continue)
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.insert_now(table, records).map(Effect::Continue)
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.update_now(table, records).map(Effect::Continue)
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        self.delete_now(table, ids).map(Effect::Continue)
    }

    fn commit(&self) -> Result<Effect<()>> {
        self.commit_now().map(Effect::Continue)
    }

    fn rollback(&self) -> Result<Effect<()>> {
        self.rollback_now().map(Effect::Continue)
    }
}
