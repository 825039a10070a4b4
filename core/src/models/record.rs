//! Record representation
//!
//! This module provides the records stored in tables: a mandatory string
//! `id` plus an arbitrary mapping of column names to values.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::error::{StoreError, Result};
use super::value::Value;

/// Name of the mandatory identifier column
pub const ID_COLUMN: &str = "id";

/// A record in a table
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier
    pub id: String,

    /// Column values, excluding the identifier
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Record {{ id: {}, values: {:?} }}", self.id, self.values)
    }
}

impl Record {
    /// Create a new record with no columns besides the identifier
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Create a new record with a random identifier
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Set a column and return the record
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a value for a column
    ///
    /// Setting `id` to a text value replaces the identifier.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();

        if column == ID_COLUMN {
            if let Value::Text(id) = value {
                self.id = id;
            }
            return;
        }

        self.values.insert(column, value);
    }

    /// Get a value by column name (the identifier is not stored here)
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Value of a column as used in index keys
    ///
    /// The identifier column yields the id as text; missing columns are null.
    pub fn column_value(&self, column: &str) -> Value {
        if column == ID_COLUMN {
            return Value::Text(self.id.clone());
        }

        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Build a record from a JSON object with a string `id` member
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let object = match json {
            serde_json::Value::Object(object) => object,
            other => {
                return Err(StoreError::InvalidRecord(format!(
                    "Expected a JSON object, got {}",
                    other
                )))
            }
        };

        let mut id = None;
        let mut values = BTreeMap::new();

        for (column, value) in object {
            if column == ID_COLUMN {
                match value {
                    serde_json::Value::String(s) => id = Some(s),
                    other => {
                        return Err(StoreError::InvalidRecord(format!(
                            "Record id must be a string, got {}",
                            other
                        )))
                    }
                }
            } else {
                values.insert(column, Value::from_json(value)?);
            }
        }

        let id = id.ok_or_else(|| StoreError::InvalidRecord("Record has no id".to_string()))?;

        Ok(Record { id, values })
    }

    /// Convert the record into a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert(ID_COLUMN.to_string(), serde_json::Value::String(self.id.clone()));

        for (column, value) in &self.values {
            object.insert(column.clone(), value.to_json());
        }

        serde_json::Value::Object(object)
    }
}
