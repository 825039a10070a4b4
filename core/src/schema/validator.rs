//! Declaration validation
//!
//! This module checks table and index declarations once, at setup time.
//! Nothing declared here is re-validated at scan time.

use std::collections::HashSet;
use thiserror::Error;

use crate::models::ID_COLUMN;
use super::{IndexDef, IndexKind, IndexSpec};

/// Declaration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Table or index name is empty
    #[error("Empty {0} name")]
    EmptyName(&'static str),

    /// Index kind is not recognized
    #[error("Unknown index kind {kind:?} for index {index} in table {table}")]
    UnknownIndexKind {
        /// Table name
        table: String,

        /// Index name
        index: String,

        /// Kind as declared
        kind: String,
    },

    /// Index declares no columns
    #[error("Index {index} in table {table} has no columns")]
    EmptyIndex {
        /// Table name
        table: String,

        /// Index name
        index: String,
    },

    /// A column appears twice in one index
    #[error("Column {column} appears more than once in index {index} of table {table}")]
    DuplicateIndexColumn {
        /// Table name
        table: String,

        /// Index name
        index: String,

        /// Repeated column
        column: String,
    },

    /// Index name used twice in one table
    #[error("Index {index} is declared more than once in table {table}")]
    DuplicateIndex {
        /// Table name
        table: String,

        /// Index name
        index: String,
    },

    /// No equality index on the id column alone
    #[error("Table {0} has no equality index on the id column")]
    MissingIdIndex(String),

    /// More than one equality index on the id column alone
    #[error("Table {table} declares two id equality indexes: {first} and {second}")]
    DuplicateIdIndex {
        /// Table name
        table: String,

        /// First id index
        first: String,

        /// Second id index
        second: String,
    },

    /// Table declared twice in one catalog
    #[error("Table {0} is declared more than once")]
    DuplicateTable(String),
}

/// Declaration validation result
pub type ValidationResult<T> = Result<T, DeclarationError>;

/// Declaration validator
#[derive(Debug, Clone)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate one index declaration and build its definition
    pub fn validate_index(table: &str, name: &str, spec: &IndexSpec) -> ValidationResult<IndexDef> {
        if name.is_empty() {
            return Err(DeclarationError::EmptyName("index"));
        }

        let kind: IndexKind = spec.kind.parse().map_err(|_| DeclarationError::UnknownIndexKind {
            table: table.to_string(),
            index: name.to_string(),
            kind: spec.kind.clone(),
        })?;

        if spec.columns.is_empty() {
            return Err(DeclarationError::EmptyIndex {
                table: table.to_string(),
                index: name.to_string(),
            });
        }

        // Check for duplicate columns
        let mut seen = HashSet::new();
        for column in &spec.columns {
            if !seen.insert(column.as_str()) {
                return Err(DeclarationError::DuplicateIndexColumn {
                    table: table.to_string(),
                    index: name.to_string(),
                    column: column.clone(),
                });
            }
        }

        Ok(IndexDef::new(name.to_string(), kind, spec.columns.clone()))
    }

    /// Find the single equality index on the id column alone
    pub fn find_id_index<'a>(
        table: &str,
        indexes: impl IntoIterator<Item = &'a IndexDef>,
    ) -> ValidationResult<String> {
        let mut found: Option<&IndexDef> = None;

        for index in indexes {
            let is_id_index = index.kind() == IndexKind::Equality
                && index.columns().len() == 1
                && index.columns()[0] == ID_COLUMN;

            if !is_id_index {
                continue;
            }

            if let Some(first) = found {
                return Err(DeclarationError::DuplicateIdIndex {
                    table: table.to_string(),
                    first: first.name().to_string(),
                    second: index.name().to_string(),
                });
            }

            found = Some(index);
        }

        found
            .map(|index| index.name().to_string())
            .ok_or_else(|| DeclarationError::MissingIdIndex(table.to_string()))
    }
}
