//! Error types for the core crate
//!
//! This module provides a consolidated error type for the core crate,
//! wrapping the declaration and bounds-compilation errors raised by
//! their own modules.

use thiserror::Error;
use std::io;

use crate::bounds::BoundsError;
use crate::schema::DeclarationError;

/// Core error type
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid table or index declaration
    #[error("Declaration error: {0}")]
    Declaration(#[from] DeclarationError),

    /// Predicates could not be turned into index bounds
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// Table is not declared
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Index is not declared on the table
    #[error("Unknown index {index} on table {table}")]
    UnknownIndex {
        /// Table name
        table: String,

        /// Index name
        index: String,
    },

    /// Operation on a committed or rolled back transaction
    #[error("Transaction {0} is already finished")]
    TransactionFinished(u64),

    /// A write transaction is already open on the driver
    #[error("Transaction {0} is still open; only one write transaction is allowed")]
    TransactionAlreadyOpen(u64),

    /// Update target does not exist
    #[error("No previous record found for id {id} in table {table}")]
    NoPreviousRecord {
        /// Table name
        table: String,

        /// Record identifier
        id: String,
    },

    /// The synchronous executor met an asynchronous effect
    #[error("Script suspended on an asynchronous effect inside the synchronous executor")]
    SuspendInSyncExecutor,

    /// A script was resumed with a reply of the wrong kind
    #[error("Unexpected reply: expected {expected}, got {found}")]
    UnexpectedReply {
        /// Reply kind the script waited for
        expected: &'static str,

        /// Reply kind that arrived
        found: &'static str,
    },

    /// Record or value could not be represented
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Shared state could not be accessed
    #[error("State management error: {0}")]
    State(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether the error was raised while compiling scan bounds
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, StoreError::Bounds(_))
    }

    /// Whether the error reports misuse of a finished or conflicting transaction
    pub fn is_transaction_state_error(&self) -> bool {
        matches!(
            self,
            StoreError::TransactionFinished(_) | StoreError::TransactionAlreadyOpen(_)
        )
    }
}
