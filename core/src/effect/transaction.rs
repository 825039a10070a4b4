//! Transactions
//!
//! A [`Transaction`] routes every call to one driver transaction until it
//! is committed or rolled back; after that every call fails with
//! [`StoreError::TransactionFinished`]. [`in_transaction`] wraps a script so
//! that it commits on success and rolls back before re-raising on failure.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex, MutexGuard};
use log::{debug, info, warn};

use crate::bounds::{ScanBound, WhereClause};
use crate::driver::DriverTx;
use crate::error::{StoreError, Result};
use crate::models::{Op, Record};
use crate::schema::Catalog;
use super::session::plan_scan;
use super::{Effect, Reply, Scope, Script, Session, Step};

type CommitHook = Box<dyn FnOnce() + Send>;

/// Ops waiting for commit
pub(crate) type OpBuffer = Arc<Mutex<Vec<Op>>>;

struct TxInner {
    /// Driver transaction; `None` once finished
    tx: Option<Box<dyn DriverTx>>,

    /// Run after a successful commit
    hooks: Vec<CommitHook>,

    /// Op buffers by notifier id, each flushed by one commit hook
    buffers: HashMap<u64, OpBuffer>,
}

/// Handle to an open transaction
#[derive(Clone)]
pub struct Transaction {
    /// Transaction identifier
    id: u64,

    /// Shared state
    inner: Arc<Mutex<TxInner>>,

    /// Declared tables
    catalog: Arc<Catalog>,

    /// Limit applied when a scan passes none
    default_scan_limit: Option<usize>,
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(tx: Box<dyn DriverTx>, catalog: Arc<Catalog>, default_scan_limit: Option<usize>) -> Self {
        let id = tx.id();
        debug!("Opened transaction handle {}", id);

        Transaction {
            id,
            inner: Arc::new(Mutex::new(TxInner { tx: Some(tx), hooks: Vec::new(), buffers: HashMap::new() })),
            catalog,
            default_scan_limit,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TxInner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::State(format!("Failed to lock transaction {}: {}", self.id, e)))
    }

    /// Run `f` against the driver transaction if it is still open
    fn with_tx<T>(&self, f: impl FnOnce(&dyn DriverTx) -> Result<T>) -> Result<T> {
        let inner = self.lock()?;
        match inner.tx.as_deref() {
            Some(tx) => f(tx),
            None => Err(StoreError::TransactionFinished(self.id)),
        }
    }

    /// Transaction identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether commit or rollback has been called
    pub fn is_finished(&self) -> bool {
        self.lock().map(|inner| inner.tx.is_none()).unwrap_or(true)
    }

    /// Register a callback to run after a successful commit
    ///
    /// Callbacks run in registration order and are dropped on rollback.
    pub fn on_commit<F>(&self, hook: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.lock()?;
        if inner.tx.is_none() {
            return Err(StoreError::TransactionFinished(self.id));
        }

        inner.hooks.push(Box::new(hook));
        Ok(())
    }

    /// The Op buffer kept for `key` until commit
    ///
    /// The first call for a key registers one commit hook that hands the
    /// whole buffer to `flush`; later calls return the same buffer.
    pub(crate) fn op_buffer<F>(&self, key: u64, flush: F) -> Result<OpBuffer>
    where
        F: FnOnce(Vec<Op>) + Send + 'static,
    {
        let mut inner = self.lock()?;
        if inner.tx.is_none() {
            return Err(StoreError::TransactionFinished(self.id));
        }

        if let Some(buffer) = inner.buffers.get(&key) {
            return Ok(buffer.clone());
        }

        let buffer: OpBuffer = Arc::new(Mutex::new(Vec::new()));
        let pending = buffer.clone();
        let id = self.id;

        inner.hooks.push(Box::new(move || {
            let ops = match pending.lock() {
                Ok(mut ops) => std::mem::take(&mut *ops),
                Err(e) => {
                    warn!("Dropping buffered ops of transaction {}: {}", id, e);
                    return;
                }
            };
            flush(ops);
        }));
        inner.buffers.insert(key, buffer.clone());

        Ok(buffer)
    }

    /// Publish every write, then run the commit hooks
    pub fn commit(&self) -> Result<Effect<()>> {
        let (tx, hooks) = {
            let mut inner = self.lock()?;
            let tx = inner.tx.take().ok_or(StoreError::TransactionFinished(self.id))?;
            inner.buffers.clear();
            (tx, std::mem::take(&mut inner.hooks))
        };

        let id = self.id;
        info!("Committing transaction {}", id);

        Ok(tx.commit()?.map(move |()| {
            debug!("Running {} commit hooks for transaction {}", hooks.len(), id);
            for hook in hooks {
                hook();
            }
        }))
    }

    /// Discard every write and the commit hooks
    pub fn rollback(&self) -> Result<Effect<()>> {
        let tx = {
            let mut inner = self.lock()?;
            inner.hooks.clear();
            inner.buffers.clear();
            inner.tx.take().ok_or(StoreError::TransactionFinished(self.id))?
        };

        info!("Rolling back transaction {}", self.id);
        tx.rollback()
    }
}

impl Scope for Transaction {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn scan(&self, table: &str, index: &str, clauses: &[WhereClause], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        let bounds = plan_scan(&self.catalog, table, index, clauses)?;
        let limit = limit.or(self.default_scan_limit);

        self.with_tx(|tx| tx.scan(table, index, &bounds, limit))
    }

    fn scan_all(&self, table: &str, index: &str, limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        self.catalog.index(table, index)?;
        let limit = limit.or(self.default_scan_limit);

        self.with_tx(|tx| tx.scan(table, index, &[ScanBound::unbounded()], limit))
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.with_tx(|tx| tx.insert(table, records))
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.with_tx(|tx| tx.update(table, records))
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        self.catalog.table(table)?;
        self.with_tx(|tx| tx.delete(table, ids))
    }

    fn transaction(&self) -> Option<&Transaction> {
        Some(self)
    }
}

enum TxState<S: Script, F> {
    Begin(F),
    Opening(F),
    Running(Transaction, S),
    Committing(S::Output),
    RollingBack(StoreError),
    Finished,
}

/// Script running another script inside a transaction
pub struct TxScript<S: Script, F> {
    session: Session,
    state: TxState<S, F>,
}

/// Run the script built by `build` inside a new transaction
///
/// The transaction commits when the script finishes and rolls back when it
/// fails, after which the failure is returned.
pub fn in_transaction<S, F>(session: &Session, build: F) -> TxScript<S, F>
where
    S: Script,
    F: FnOnce(Transaction) -> S,
{
    TxScript {
        session: session.clone(),
        state: TxState::Begin(build),
    }
}

impl<S, F> TxScript<S, F>
where
    S: Script,
    S::Output: Send,
    F: FnOnce(Transaction) -> S + Send,
{
    fn drive(&mut self, tx: Transaction, mut script: S, reply: Result<Reply>) -> Result<Step<S::Output>> {
        match script.resume(reply) {
            Ok(Step::Yield(effect)) => {
                self.state = TxState::Running(tx, script);
                Ok(Step::Yield(effect))
            }
            Ok(Step::Done(output)) => {
                // The script may have finished the transaction itself
                if tx.is_finished() {
                    return Ok(Step::Done(output));
                }

                let effect = tx.commit()?;
                self.state = TxState::Committing(output);
                Ok(Step::Yield(effect.erase()))
            }
            Err(error) => {
                warn!("Transaction {} failed: {}", tx.id(), error);

                match tx.rollback() {
                    Ok(effect) => {
                        self.state = TxState::RollingBack(error);
                        Ok(Step::Yield(effect.erase()))
                    }
                    Err(_) => Err(error),
                }
            }
        }
    }
}

impl<S, F> Script for TxScript<S, F>
where
    S: Script,
    S::Output: Send,
    F: FnOnce(Transaction) -> S + Send,
{
    type Output = S::Output;

    fn resume(&mut self, reply: Result<Reply>) -> Result<Step<S::Output>> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Begin(build) => {
                reply?;
                let effect = self.session.driver().begin_tx()?;
                self.state = TxState::Opening(build);
                Ok(Step::Yield(effect.erase()))
            }
            TxState::Opening(build) => {
                let tx = Transaction::new(
                    reply?.into_transaction()?,
                    self.session.shared_catalog(),
                    self.session.default_scan_limit(),
                );
                let script = build(tx.clone());
                self.drive(tx, script, Ok(Reply::Start))
            }
            TxState::Running(tx, script) => self.drive(tx, script, reply),
            TxState::Committing(output) => {
                reply?;
                Ok(Step::Done(output))
            }
            TxState::RollingBack(error) => {
                if let Err(e) = reply {
                    warn!("Rollback failed: {}", e);
                }
                Err(error)
            }
            TxState::Finished => Err(StoreError::State("Transaction script resumed after it finished".to_string())),
        }
    }
}
