//! Typed models
//!
//! A [`Model`] is a serde type stored in one table. [`Collection`] reads and
//! writes models through any scope, converting to and from records.

use std::marker::PhantomData;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tuplestore_core::effect::Effect;
use tuplestore_core::{Record, Scope, StoreError};

use crate::error::{ClientError, Result};
use crate::query::Query;

/// A type stored as records of one table
///
/// The serialized form must be a flat object with a string `id` field.
pub trait Model: Serialize + DeserializeOwned + Send + 'static {
    /// Table holding this model
    const TABLE: &'static str;

    /// Convert into a record
    fn to_record(&self) -> Result<Record> {
        let json = serde_json::to_value(self)?;
        Ok(Record::from_json(json)?)
    }

    /// Build from a stored record
    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(record.to_json())?)
    }
}

fn to_records<M: Model>(models: &[M]) -> Result<Vec<Record>> {
    models.iter().map(Model::to_record).collect()
}

fn from_records<M: Model>(records: Vec<Record>) -> tuplestore_core::Result<Vec<M>> {
    records
        .into_iter()
        .map(|record| M::from_record(record).map_err(StoreError::from))
        .collect()
}

/// Typed access to a model's table
pub struct Collection<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> Default for Collection<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("model", &std::any::type_name::<M>()).finish()
    }
}

impl<M> Collection<M> {
    /// Create a collection
    pub fn new() -> Self {
        Collection { _model: PhantomData }
    }
}

impl<M: Model> Collection<M> {
    /// Fetch one model by id
    pub fn get<S: Scope + ?Sized>(&self, scope: &S, id: &str) -> Result<Effect<Option<M>>> {
        let effect = scope.get_many(M::TABLE, &[id.to_string()])?;

        Ok(effect.and_then(|records| {
            let model = records.into_iter().next().map(M::from_record).transpose()?;
            Ok(model)
        })?)
    }

    /// Run a query against this model's table
    pub fn find<S: Scope + ?Sized>(&self, scope: &S, query: &Query) -> Result<Effect<Vec<M>>> {
        if query.table_name() != M::TABLE {
            return Err(ClientError::Query(format!(
                "Query on {} cannot return models of table {}",
                query.table_name(),
                M::TABLE
            )));
        }

        Ok(query.scan(scope)?.and_then(from_records::<M>)?)
    }

    /// Insert models
    pub fn insert<S: Scope + ?Sized>(&self, scope: &S, models: &[M]) -> Result<Effect<()>> {
        let records = to_records(models)?;
        debug!("Inserting {} models into {}", records.len(), M::TABLE);

        Ok(scope.insert(M::TABLE, &records)?)
    }

    /// Replace stored models
    pub fn update<S: Scope + ?Sized>(&self, scope: &S, models: &[M]) -> Result<Effect<()>> {
        let records = to_records(models)?;
        debug!("Updating {} models in {}", records.len(), M::TABLE);

        Ok(scope.update(M::TABLE, &records)?)
    }

    /// Delete models by id
    pub fn delete<S: Scope + ?Sized>(&self, scope: &S, ids: &[String]) -> Result<Effect<()>> {
        debug!("Deleting {} models from {}", ids.len(), M::TABLE);

        Ok(scope.delete(M::TABLE, ids)?)
    }
}
