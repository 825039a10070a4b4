//! Observed scopes
//!
//! Writes through an [`Observed`] scope are diffed into Ops. Prior values
//! come from the table's id index before the write is issued.

use std::collections::HashMap;
use log::{debug, warn};

use crate::effect::{Effect, Scope, Transaction};
use crate::error::{StoreError, Result};
use crate::models::{Op, Record};
use super::{NotificationMode, Notifier};

/// Where a batch of Ops goes once the write succeeded
#[derive(Clone)]
struct Delivery {
    notifier: Notifier,
    tx: Option<Transaction>,
}

impl Delivery {
    fn deliver(&self, ops: &[Op]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let tx = match (&self.tx, self.notifier.mode()) {
            (Some(tx), NotificationMode::PerTransaction) => tx,
            _ => return self.notifier.dispatch(ops),
        };

        // One buffer per notifier and transaction, shared by every Observed
        let notifier = self.notifier.clone();
        let buffer = tx.op_buffer(notifier.id(), move |ops| {
            if let Err(e) = notifier.dispatch(&ops) {
                warn!("Failed to notify subscribers: {}", e);
            }
        })?;

        let mut pending = buffer.lock()
            .map_err(|e| StoreError::State(format!("Failed to lock pending ops: {}", e)))?;
        pending.extend_from_slice(ops);

        debug!("Buffered {} ops until transaction {} commits", pending.len(), tx.id());
        Ok(())
    }
}

/// A scope whose writes are reported as Ops
pub struct Observed<S> {
    scope: S,
    delivery: Delivery,
}

impl<S: Scope + Clone + 'static> Observed<S> {
    pub(super) fn new(scope: S, notifier: Notifier) -> Self {
        let tx = scope.transaction().cloned();

        Observed {
            scope,
            delivery: Delivery { notifier, tx },
        }
    }

    /// The wrapped scope
    pub fn scope(&self) -> &S {
        &self.scope
    }

    /// Insert records, emitting one Insert per record
    pub fn insert(&self, table: &str, records: &[Record]) -> Result<Effect<Vec<Op>>> {
        let ops: Vec<Op> = records
            .iter()
            .map(|record| Op::Insert { table: table.to_string(), new_value: record.clone() })
            .collect();

        let delivery = self.delivery.clone();
        self.scope.insert(table, records)?.and_then(move |()| {
            delivery.deliver(&ops)?;
            Ok(ops)
        })
    }

    /// Update records, emitting one Update per record with its prior value
    ///
    /// Fails with [`StoreError::NoPreviousRecord`] before writing anything
    /// if any id has no stored record.
    pub fn update(&self, table: &str, records: &[Record]) -> Result<Effect<Vec<Op>>> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let scope = self.scope.clone();
        let delivery = self.delivery.clone();
        let table = table.to_string();
        let records = records.to_vec();

        self.scope.get_many(&table, &ids)?.then(move |priors| {
            let mut current: HashMap<String, Record> = priors.into_iter().map(|r| (r.id.clone(), r)).collect();

            let mut ops = Vec::with_capacity(records.len());
            for record in &records {
                let old_value = current
                    .insert(record.id.clone(), record.clone())
                    .ok_or_else(|| StoreError::NoPreviousRecord { table: table.clone(), id: record.id.clone() })?;

                ops.push(Op::Update { table: table.clone(), old_value, new_value: record.clone() });
            }

            scope.update(&table, &records)?.and_then(move |()| {
                delivery.deliver(&ops)?;
                Ok(ops)
            })
        })
    }

    /// Delete records, emitting one Delete per id that existed
    pub fn delete(&self, table: &str, ids: &[String]) -> Result<Effect<Vec<Op>>> {
        let scope = self.scope.clone();
        let delivery = self.delivery.clone();
        let table = table.to_string();

        self.scope.get_many(&table, ids)?.then(move |priors| {
            if priors.is_empty() {
                return Ok(Effect::Continue(Vec::new()));
            }

            let existing: Vec<String> = priors.iter().map(|r| r.id.clone()).collect();
            let ops: Vec<Op> = priors
                .into_iter()
                .map(|old_value| Op::Delete { table: table.clone(), old_value })
                .collect();

            scope.delete(&table, &existing)?.and_then(move |()| {
                delivery.deliver(&ops)?;
                Ok(ops)
            })
        })
    }
}
