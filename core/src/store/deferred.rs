//! Asynchronous driver
//!
//! Wraps a [`MemoryDriver`] and answers every call with `Effect::Suspend`.
//! The work runs only once the returned future is polled, after yielding to
//! the runtime, the way an external engine answers some time later.

use log::debug;

use crate::bounds::ScanBound;
use crate::driver::{Driver, DriverTx};
use crate::effect::Effect;
use crate::error::Result;
use crate::models::Record;
use crate::schema::TableDef;
use super::memory::{MemoryDriver, MemoryTx};

/// Driver whose every call suspends
#[derive(Debug, Clone, Default)]
pub struct DeferredDriver {
    inner: MemoryDriver,
}

impl DeferredDriver {
    /// Wrap an in-memory driver
    pub fn new(inner: MemoryDriver) -> Self {
        DeferredDriver { inner }
    }

    /// The wrapped driver, for direct inspection
    pub fn inner(&self) -> &MemoryDriver {
        &self.inner
    }
}

impl Driver for DeferredDriver {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn load_tables(&self, tables: &[TableDef]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let tables = tables.to_vec();

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.load_tables_now(&tables)
        }))
    }

    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        let inner = self.inner.clone();
        let (table, index, bounds) = (table.to_string(), index.to_string(), bounds.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.scan_now(&table, &index, &bounds, limit)
        }))
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, records) = (table.to_string(), records.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.insert_now(&table, &records)
        }))
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, records) = (table.to_string(), records.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.update_now(&table, &records)
        }))
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, ids) = (table.to_string(), ids.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.delete_now(&table, &ids)
        }))
    }

    fn begin_tx(&self) -> Result<Effect<Box<dyn DriverTx>>> {
        let inner = self.inner.clone();

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            let tx = inner.begin_tx_now()?;
            debug!("Deferred transaction {} ready", tx.id());

            let tx: Box<dyn DriverTx> = Box::new(DeferredTx { inner: tx });
            Ok(tx)
        }))
    }
}

/// Transaction on a [`DeferredDriver`]
#[derive(Debug, Clone)]
pub struct DeferredTx {
    inner: MemoryTx,
}

impl DriverTx for DeferredTx {
    fn id(&self) -> u64 {
        self.inner.id()
    }

    fn scan(&self, table: &str, index: &str, bounds: &[ScanBound], limit: Option<usize>) -> Result<Effect<Vec<Record>>> {
        let inner = self.inner.clone();
        let (table, index, bounds) = (table.to_string(), index.to_string(), bounds.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.scan_now(&table, &index, &bounds, limit)
        }))
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, records) = (table.to_string(), records.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.insert_now(&table, &records)
        }))
    }

    fn update(&self, table: &str, records: &[Record]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, records) = (table.to_string(), records.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.update_now(&table, &records)
        }))
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<()>> {
        let inner = self.inner.clone();
        let (table, ids) = (table.to_string(), ids.to_vec());

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.delete_now(&table, &ids)
        }))
    }

    fn commit(&self) -> Result<Effect<()>> {
        let inner = self.inner.clone();

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.commit_now()
        }))
    }

    fn rollback(&self) -> Result<Effect<()>> {
        let inner = self.inner.clone();

        Ok(Effect::suspend(async move {
            tokio::task::yield_now().await;
            inner.rollback_now()
        }))
    }
}
